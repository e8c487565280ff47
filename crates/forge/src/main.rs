use anyhow::Result;
use clap::Parser;
use probe_core::{decode, forge};

#[derive(Parser, Debug)]
#[command(name = "forge")]
#[command(about = "Print an unsigned test token, or decode one")]
struct Args {
    /// Subject claim
    #[arg(long, default_value = "example_user")]
    subject: String,

    /// Role claim
    #[arg(long, default_value = "admin")]
    role: String,

    /// Length of the filler payload
    #[arg(long, default_value = "20")]
    payload_size: usize,

    /// Decode this token instead of forging one
    #[arg(long)]
    decode: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(token) = args.decode {
        let (header, claims) = decode(&token)?;
        println!("{}", serde_json::to_string_pretty(&header)?);
        println!("{}", serde_json::to_string_pretty(&claims)?);
        return Ok(());
    }

    let token = forge(&args.subject, &args.role, args.payload_size);
    println!("{token}");
    eprintln!(
        "Token is unsigned (alg=none) and expires at {}. Only use it against services you are authorized to test.",
        token.claims().exp
    );

    Ok(())
}
