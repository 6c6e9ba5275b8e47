use messages::{
    decorators::{thread::Thread, timing::Timing},
    msg_fields::protocols::{
        notification::ack::{AckContent, AckDecorators, AckStatus},
        report_problem::{Description, ProblemReport, ProblemReportContent, ProblemReportDecorators},
    },
};
use uuid::Uuid;

pub fn build_problem_report_msg(code: &str, explain: Option<String>, thread_id: &str) -> ProblemReport {
    let id = Uuid::new_v4().to_string();
    let description = Description::builder().code(code.to_owned()).build();
    let content = match explain {
        Some(explain) => ProblemReportContent::builder()
            .description(description)
            .explain(explain)
            .build(),
        None => ProblemReportContent::builder()
            .description(description)
            .build(),
    };

    let decorators = ProblemReportDecorators::builder()
        .thread(Thread::builder().thid(thread_id.to_owned()).build())
        .timing(Timing::now())
        .build();

    ProblemReport::builder()
        .id(id)
        .content(content)
        .decorators(decorators)
        .build()
}

/// Content and decorators shared by every ack flavour.
pub fn build_ack_parts(thread_id: &str) -> (String, AckContent, AckDecorators) {
    let content = AckContent::builder().status(AckStatus::Ok).build();
    let decorators = AckDecorators::builder()
        .thread(Thread::builder().thid(thread_id.to_owned()).build())
        .timing(Timing::now())
        .build();
    (Uuid::new_v4().to_string(), content, decorators)
}

/// Reason carried by a problem report: the code, else the explanation.
pub fn problem_report_reason(problem_report: &ProblemReport) -> String {
    problem_report
        .code()
        .or(problem_report.explain())
        .unwrap_or("unspecified")
        .to_owned()
}
