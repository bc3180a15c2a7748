use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let log_guard = pplx::logging::init();
    let result = pplx::run().await;
    drop(log_guard);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", pplx::diagnostic(&err));
            ExitCode::FAILURE
        }
    }
}
