use progress_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    progress_stream::init_observability();
    let mut args = std::env::args().skip(1);
    let (Some(jd_id), Some(path)) = (args.next(), args.next()) else {
        eprintln!("usage: collect_evaluation <jd-id> <resume.pdf>");
        std::process::exit(2);
    };

    let bytes = std::fs::read(&path)?;
    let file_name = std::path::Path::new(&path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("resume.pdf")
        .to_string();

    let client = StreamClient::from_env()?;
    let (sink, mut rx) = ChannelSink::new();
    let call = client.evaluate(jd_id.parse()?, Document::new(file_name, bytes), sink)?;

    while let Some(message) = rx.recv().await {
        match message {
            SinkMessage::Event(DomainEvent::TaskBreakdown(plan)) => {
                eprintln!("plan: {} steps", plan.total_steps);
            }
            SinkMessage::Event(DomainEvent::StepResult(step)) if step.is_complete() => {
                eprintln!("step {} {}: {:?}", step.step, step.name, step.score);
            }
            SinkMessage::Error(message) => eprintln!("evaluation error: {message}"),
            _ => {}
        }
    }

    match call.finish().await? {
        StreamOutcome::Completed(evaluation) => {
            println!("total score: {:.1}", evaluation.total_score());
        }
        StreamOutcome::Cancelled => println!("cancelled"),
    }
    Ok(())
}
