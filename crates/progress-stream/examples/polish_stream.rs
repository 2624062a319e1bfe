use progress_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    progress_stream::init_observability();
    let client = StreamClient::from_env()?;

    let call = client.polish(
        "负责公司后端系统开发，参与需求评审，优化接口性能。",
        Callbacks::new()
            .with_progress(|event| {
                if let DomainEvent::Progress(notice) = event {
                    match notice.percent {
                        Some(percent) => eprintln!("[{percent:>5.1}%] {}", notice.message),
                        None => eprintln!("{}", notice.message),
                    }
                }
            })
            .with_error(|message| eprintln!("polish error: {message}")),
    )?;

    if let Some(text) = call.finish().await?.completed() {
        println!("{text}");
    }
    Ok(())
}
