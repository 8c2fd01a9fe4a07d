//! `rag ask`: run the full retrieve → prompt → generate flow.

use anyhow::Result;

use crate::config::Config;
use crate::runtime::Runtime;

pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let runtime = Runtime::from_config(config).await?;
    let answer = runtime.orchestrator.answer(question).await?;
    println!("{}", answer.answer);
    Ok(())
}
