use super::*;

#[test]
fn parses_migrate_command() {
    let cli = Cli::try_parse_from(["beanstore-cli", "migrate"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Migrate)));
}

#[test]
fn import_path_defaults_to_none() {
    let cli = Cli::try_parse_from(["beanstore-cli", "import"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Import { path: None })));
}

#[test]
fn import_accepts_explicit_path() {
    let cli = Cli::try_parse_from(["beanstore-cli", "import", "--path", "beans.json"])
        .expect("expected valid cli args");

    match cli.command {
        Some(Commands::Import { path: Some(path) }) => {
            assert_eq!(path, PathBuf::from("beans.json"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_list_and_featured_commands() {
    let list = Cli::try_parse_from(["beanstore-cli", "list"]).expect("expected valid cli args");
    assert!(matches!(list.command, Some(Commands::List)));

    let featured =
        Cli::try_parse_from(["beanstore-cli", "featured"]).expect("expected valid cli args");
    assert!(matches!(featured.command, Some(Commands::Featured)));
}

#[test]
fn select_parses_seed() {
    let cli = Cli::try_parse_from(["beanstore-cli", "select", "--seed", "42"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Select { seed: Some(42) })
    ));
}

#[test]
fn select_rejects_non_numeric_seed() {
    assert!(Cli::try_parse_from(["beanstore-cli", "select", "--seed", "abc"]).is_err());
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["beanstore-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}
