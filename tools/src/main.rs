//! gamectl: command-line driver for the gamification engine.
//!
//! Usage:
//!   gamectl --db game.db --user dev-42
//!   gamectl --db game.db --leaderboard 20
//!   gamectl --db game.db --ipc-mode < commands.jsonl

use anyhow::Result;
use gamification_core::{engine::GamificationEngine, profile::GamificationProfile};
use std::env;
use std::io::{self, BufRead, Write};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");
    let user = string_arg(&args, "--user");
    let leaderboard = args
        .iter()
        .any(|a| a == "--leaderboard")
        .then(|| parse_arg(&args, "--leaderboard", 10usize));

    if !ipc_mode {
        println!("gamectl");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let mut engine = GamificationEngine::build(data_dir, db)?;

    if ipc_mode {
        return run_ipc_loop(&mut engine);
    }

    if let Some(user_id) = user {
        let profile = engine.get_user_profile(user_id)?;
        print_profile(&profile);
    }
    if let Some(limit) = leaderboard {
        print_leaderboard(&engine, limit)?;
    }
    if user.is_none() && leaderboard.is_none() {
        println!("  users:     {}", engine.store().user_count()?);
    }
    Ok(())
}

/// One JSON command per stdin line, one JSON response per stdout line.
fn run_ipc_loop(engine: &mut GamificationEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        let line = buffer.trim();
        if line.is_empty() {
            continue;
        }
        if line == r#"{"cmd":"quit"}"# {
            break;
        }

        let response = engine.dispatch_json(line);
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_profile(p: &GamificationProfile) {
    println!("=== PROFILE: {} ===", p.user_id);
    println!("  total xp:       {}", p.total_xp);
    println!(
        "  level:          {} ({:.0}% to next)",
        p.current_level,
        p.level_progress * 100.0
    );
    if let Some(xp) = p.xp_to_next_level {
        println!("  xp to next:     {xp}");
    }
    println!(
        "  points:         {} available ({} monthly, {} used, {} earned)",
        p.available_points, p.monthly_points, p.points_used, p.points_earned
    );
    println!("  next reset:     {}", p.points_reset_date.format("%Y-%m-%d"));
    println!("  streak:         {}", p.streak);
    println!(
        "  badges:         {}/{}",
        p.earned_badge_count(),
        p.badges.len()
    );
    for b in p.badges.iter().filter(|b| b.is_earned) {
        println!("    * {} ({})", b.badge.name, b.badge.id);
    }

    println!();
    println!("=== RECENT TRANSACTIONS ===");
    if p.recent_transactions.is_empty() {
        println!("  (none)");
    }
    for t in &p.recent_transactions {
        match serde_json::to_string(t) {
            Ok(line) => println!("  {line}"),
            Err(e) => log::warn!("cannot render transaction: {e}"),
        }
    }
}

fn print_leaderboard(engine: &GamificationEngine, limit: usize) -> Result<()> {
    println!("=== LEADERBOARD (top {limit}) ===");
    let entries = engine.leaderboard(limit)?;
    if entries.is_empty() {
        println!("  (no users yet)");
    }
    for e in entries {
        println!(
            "  {:>3}. {:<24} {:>8} XP  level {}",
            e.rank, e.row.user_id, e.row.total_xp, e.row.current_level
        );
    }
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
