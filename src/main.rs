//! Inspect and exercise a layout file of action creators.
//!
//! Run with a layout path to list every action type it binds to.
//! Run with `--call foo.bar ARGS..` to invoke one bound action; the dispatched
//! action is printed to stdout as a JSON line.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use obj_actions::{bind_with, Action, BindConfig, Layout, Payload};

// ───────────────────────────────────────── CLI ───────────────

#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"), about = "Bind a layout of action creators")]
struct Cli {
    /// Layout file declaring the creators.
    layout: PathBuf,

    /// Prepended to every action type.
    #[arg(long, default_value = "")]
    prefix: String,

    /// Joins nested keys into an action type.
    #[arg(long, default_value = "_")]
    separator: String,

    /// Maximum namespace nesting.
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Print every action type and exit (the default without `--call`).
    #[arg(long)]
    list: bool,

    /// Dotted path of the action to invoke, followed by its arguments.
    /// Arguments are read as JSON when they parse, otherwise as strings.
    #[arg(long, num_args = 1.., value_name = "PATH [ARGS]")]
    call: Option<Vec<String>>,
}

impl Cli {
    fn bind_config(&self) -> BindConfig {
        BindConfig {
            prefix: self.prefix.clone(),
            separator: self.separator.clone(),
            max_depth: self.max_depth,
        }
    }
}

fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

// ───────────────────────────────────────── run ──────────────

/// Bind the layout and either list its action types or call one action,
/// writing results to `out`.  Returns how many actions were dispatched.
fn run(cli: &Cli, out: &mut impl Write) -> Result<usize> {
    let layout = Layout::load(&cli.layout)?;

    let dispatched = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&dispatched);
    let actions = bind_with(
        move |action: Action| -> Payload {
            counter.fetch_add(1, Ordering::SeqCst);
            action.into_payload()
        },
        layout.tree(),
        &cli.bind_config(),
    )
    .with_context(|| format!("binding {}", cli.layout.display()))?;

    match &cli.call {
        Some(call) if !cli.list => {
            let Some((path, args)) = call.split_first() else {
                anyhow::bail!("--call needs an action path");
            };
            let segments: Vec<&str> = path.split('.').collect();
            let args: Vec<Value> = args.iter().map(|a| parse_arg(a)).collect();
            let payload = actions.call(&segments[..], &args)?;
            writeln!(out, "{}", serde_json::to_string(&payload)?)?;
        }
        _ => {
            for action_type in actions.action_types() {
                writeln!(out, "{action_type}")?;
            }
        }
    }

    Ok(dispatched.load(Ordering::SeqCst))
}

// ───────────────────────────────────────── main ─────────────

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only results.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let dispatched = run(&cli, &mut io::stdout().lock())?;
    tracing::info!(dispatched, "done");
    Ok(())
}
