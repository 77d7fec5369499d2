fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = todo_minder::config::data_directory();

    let _logger = match todo_minder::logging::init_logging(&data_dir) {
        Ok(handle) => Some(handle),
        Err(error) => {
            eprintln!("logging disabled: {error}");
            None
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    todo_minder::block_on_detached(runtime, todo_minder::run(data_dir))?;
    Ok(())
}
