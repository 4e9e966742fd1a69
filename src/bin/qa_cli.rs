use std::io::{self, BufRead, Write};

use anyhow::Result;

use doc_qa::config::AppConfig;
use doc_qa::runtime::BlockingRunner;
use doc_qa::setup::Components;
use doc_qa::telemetry::init_tracing;

fn main() -> Result<()> {
    init_tracing("warn");

    let config = AppConfig::from_env()?;
    let runner = BlockingRunner::new()?;
    let components = runner.block_on(Components::from_config(&config))?;

    println!("Document Q&A Bot");
    println!("Type your question (or 'exit' to quit):");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nYour question: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let query = line?;
        if query.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        match runner.ask(&components.agent, &query) {
            Ok(answer) => println!("\nAnswer: {}", answer),
            Err(e) => eprintln!("\nError: {}", e),
        }
    }

    Ok(())
}
