//! CLI parse tests.

use super::{Cli, CliCommand, PolicyArg};
use crate::cli::commands::parse_pick;
use clap::Parser;
use std::path::PathBuf;
use vidq_core::storage::SplitPolicy;

pub(super) fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn cli_parse_console_defaults() {
    match parse(&["vidq", "console"]) {
        CliCommand::Console { user, chat, out } => {
            assert_eq!(user, 1);
            assert_eq!(chat, None);
            assert_eq!(out, None);
        }
        _ => panic!("expected Console"),
    }
}

#[test]
fn cli_parse_console_options() {
    match parse(&["vidq", "console", "--user", "42", "--chat=-100", "--out", "/tmp/v"]) {
        CliCommand::Console { user, chat, out } => {
            assert_eq!(user, 42);
            assert_eq!(chat, Some(-100));
            assert_eq!(out, Some(PathBuf::from("/tmp/v")));
        }
        _ => panic!("expected Console"),
    }
}

#[test]
fn cli_parse_resolve_and_search() {
    match parse(&["vidq", "resolve", "https://example.com/watch?v=x"]) {
        CliCommand::Resolve { url } => assert_eq!(url, "https://example.com/watch?v=x"),
        _ => panic!("expected Resolve"),
    }
    match parse(&["vidq", "search", "lo fi beats"]) {
        CliCommand::Search { query } => assert_eq!(query, "lo fi beats"),
        _ => panic!("expected Search"),
    }
}

#[test]
fn cli_parse_split() {
    match parse(&["vidq", "split", "movie.mp4"]) {
        CliCommand::Split {
            path,
            policy,
            ceiling,
            out,
        } => {
            assert_eq!(path, PathBuf::from("movie.mp4"));
            assert_eq!(policy, PolicyArg::Fixed);
            assert_eq!(ceiling, None);
            assert_eq!(out, None);
        }
        _ => panic!("expected Split"),
    }
    match parse(&[
        "vidq", "split", "movie.mp4", "--policy", "equal", "--ceiling", "1000", "--out", "parts",
    ]) {
        CliCommand::Split {
            policy,
            ceiling,
            out,
            ..
        } => {
            assert_eq!(SplitPolicy::from(policy), SplitPolicy::EqualParts);
            assert_eq!(ceiling, Some(1000));
            assert_eq!(out, Some(PathBuf::from("parts")));
        }
        _ => panic!("expected Split"),
    }
}

#[test]
fn cli_rejects_unknown_policy_and_missing_args() {
    assert!(Cli::try_parse_from(["vidq", "split", "a", "--policy", "halves"]).is_err());
    assert!(Cli::try_parse_from(["vidq", "resolve"]).is_err());
    assert!(Cli::try_parse_from(["vidq"]).is_err());
}

#[test]
fn pick_syntax() {
    assert_eq!(parse_pick("#1"), Some(1));
    assert_eq!(parse_pick("# 12"), Some(12));
    assert_eq!(parse_pick("#x"), None);
    assert_eq!(parse_pick("1"), None);
    assert_eq!(parse_pick("https://e.com/#3"), None);
}
