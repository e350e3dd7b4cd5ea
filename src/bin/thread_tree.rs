use std::io::{self, Write};

use clap::{Parser, ValueEnum};
use sqlx::postgres::PgPoolOptions;

use inbox_server::store::fetch_thread_messages;
use inbox_server::threading::{
    Forest, SerializedNode, check_nested_depth, get_thread_forest, nest, serialize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Recursive query in the database.
    Forest,
    /// In-memory builder over the flat message list.
    Memory,
    /// Run both and report whether they agree.
    Both,
}

#[derive(Parser, Debug)]
#[command(name = "thread_tree", about = "Print the reply forest of a thread")]
struct Args {
    /// Thread to print.
    #[arg(long)]
    thread_id: i64,

    /// Which threading path to run.
    #[arg(long, value_enum, default_value = "forest")]
    source: Source,

    /// Emit nested JSON instead of an indented outline.
    #[arg(long)]
    nested: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    let nodes = match args.source {
        Source::Forest => get_thread_forest(&pool, args.thread_id).await?,
        Source::Memory => {
            let messages = fetch_thread_messages(&pool, args.thread_id).await?;
            serialize(&Forest::build_for_thread(args.thread_id, messages)?)
        }
        Source::Both => {
            let from_db = get_thread_forest(&pool, args.thread_id).await?;
            let messages = fetch_thread_messages(&pool, args.thread_id).await?;
            let in_memory = serialize(&Forest::build_for_thread(args.thread_id, messages)?);

            if from_db != in_memory {
                writeln!(
                    io::stderr(),
                    "error: recursive query and in-memory builder disagree for thread {} ({} vs {} nodes)",
                    args.thread_id,
                    from_db.len(),
                    in_memory.len()
                )?;
                std::process::exit(1);
            }
            log::info!("both paths agree on {} messages", from_db.len());
            from_db
        }
    };

    if nodes.is_empty() {
        writeln!(io::stderr(), "thread {} has no messages", args.thread_id)?;
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.nested {
        if let Err(err) = check_nested_depth(&nodes) {
            writeln!(io::stderr(), "error: {err}")?;
            std::process::exit(1);
        }
        serde_json::to_writer_pretty(&mut out, &nest(nodes))?;
        writeln!(out)?;
    } else {
        for node in &nodes {
            print_outline_line(&mut out, node)?;
        }
    }

    Ok(())
}

fn print_outline_line(out: &mut impl Write, node: &SerializedNode) -> io::Result<()> {
    let indent = "  ".repeat(node.depth.max(0) as usize);
    let preview: String = node.message.content.chars().take(60).collect();
    writeln!(
        out,
        "{indent}#{} {} [{}] {}",
        node.id,
        node.message.sender,
        node.message.sent_at.to_rfc3339(),
        preview
    )
}
