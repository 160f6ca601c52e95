//! Tests for status, stage, collect, config and the global flag.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_status() {
    match parse(&["deid", "status", "deid-5-0123456789ab"]) {
        CliCommand::Status { handle } => assert_eq!(handle, "deid-5-0123456789ab"),
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_stage() {
    match parse(&["deid", "stage", "5-7", "/mnt/share/notes"]) {
        CliCommand::Stage { range, local_root } => {
            assert_eq!(range, "5-7");
            assert_eq!(local_root, Path::new("/mnt/share/notes"));
        }
        _ => panic!("expected Stage"),
    }
}

#[test]
fn cli_parse_collect() {
    match parse(&["deid", "collect", "5-7", "out"]) {
        CliCommand::Collect {
            range,
            out_dir,
            delete,
        } => {
            assert_eq!(range, "5-7");
            assert_eq!(out_dir, Path::new("out"));
            assert!(!delete);
        }
        _ => panic!("expected Collect"),
    }
}

#[test]
fn cli_parse_collect_delete() {
    match parse(&["deid", "collect", "1-1", "out", "--delete"]) {
        CliCommand::Collect { delete, .. } => assert!(delete),
        _ => panic!("expected Collect with --delete"),
    }
}

#[test]
fn cli_parse_config() {
    match parse(&["deid", "config"]) {
        CliCommand::Config => {}
        _ => panic!("expected Config"),
    }
}

#[test]
fn cli_global_config_flag_any_position() {
    let cli = Cli::try_parse_from(["deid", "--config", "/etc/deid.toml", "config"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/deid.toml")));

    let cli = Cli::try_parse_from(["deid", "run", "1-2", "--config", "c.toml"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("c.toml")));
}
