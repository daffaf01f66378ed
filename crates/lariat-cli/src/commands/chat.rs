//! Interactive chat session

use clap::Args;
use lariat_agent::AgentEvent;
use lariat_eval::target::extract_final_answer;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Initial goal or task for the agent
    pub goal: Option<String>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    pub temperature: Option<f32>,
}

pub async fn run(args: ChatArgs, config: Config) -> anyhow::Result<()> {
    println!("lariat agent - MCP-enabled assistant");
    println!("Type 'quit' to exit\n");

    println!("Initializing agent...");
    let mut agent = super::build_agent(&config, args.model, args.temperature).await?;
    println!("Agent ready.\n");

    // Print tool activity as it happens
    let mut events = agent.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                AgentEvent::ToolExecutionStart { tool_name, .. } => {
                    println!("  [tool] {}...", tool_name);
                }
                AgentEvent::GuardTriggered {
                    tokens_before,
                    tokens_after,
                    ..
                } => {
                    println!(
                        "  [guard] tool result reduced ({} -> {} tokens)",
                        tokens_before, tokens_after
                    );
                }
                _ => {}
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut goal = args.goal;

    loop {
        let input = match goal.take() {
            Some(goal) => goal,
            None => {
                println!("What's next? (or 'quit' to exit)");
                match stdin.next_line().await? {
                    Some(line) => line.trim().to_string(),
                    None => break,
                }
            }
        };

        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        match agent.prompt(&input).await {
            Ok(()) => {
                let answer = extract_final_answer(agent.messages());
                println!("\n{}\n", answer);
            }
            Err(e) => {
                eprintln!("Agent error: {}", e);
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}
