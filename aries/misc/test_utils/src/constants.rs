/// Public DID the test issuers publish their schemas under.
pub const ISSUER_DID: &str = "V4SGRU86Z58d6TV7PBUe6f";
