use clap::Parser;

use skillview::cli::{Cli, Commands, OutputFormat};

#[test]
fn global_flags_apply_after_subcommand() {
    let cli = Cli::try_parse_from(["skillview", "status", "--robot", "-v"]).unwrap();
    assert!(cli.robot);
    assert_eq!(cli.verbose, 1);
    assert_eq!(cli.output_format(), OutputFormat::Json);
}

#[test]
fn show_requires_a_skill() {
    assert!(Cli::try_parse_from(["skillview", "show"]).is_err());
    let cli = Cli::try_parse_from(["skillview", "show", "deploy", "--full"]).unwrap();
    match cli.command {
        Commands::Show(args) => {
            assert_eq!(args.skill, "deploy");
            assert!(args.full);
            assert!(!args.compact);
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn tail_exit_flag() {
    let cli = Cli::try_parse_from(["skillview", "tail", "--exit-on-complete"]).unwrap();
    assert!(matches!(cli.command, Commands::Tail(args) if args.exit_on_complete));
}

#[test]
fn list_defaults() {
    let cli = Cli::try_parse_from(["skillview", "list"]).unwrap();
    match cli.command {
        Commands::List(args) => {
            assert_eq!(args.limit, 50);
            assert!(args.filter.is_none());
        }
        other => panic!("unexpected command {other:?}"),
    }
}
