use jade::config::read_jade_toml;
use jade::lexer::tokenize;
use jade::source::{DiskSource, FileSource};
use jade::{compile_dir, render_diagnostic, Compiler, DirOptions, JadeError, JadeToml, Options};
use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

const CONFIG_FILE: &str = "jade.toml";

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(JadeError::Diagnostic(diagnostic)) => {
            eprintln!("{}", render_diagnostic(&diagnostic));
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), JadeError> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "-h" | "--help" => {
            print_help();
            Ok(())
        }
        "compile" => cmd_compile(&rest),
        "parse" => cmd_parse(&rest),
        "tokens" => cmd_tokens(&rest),
        "dir" => cmd_dir(&rest),
        other => Err(JadeError::InvalidCommand(format!("unknown command {other}"))),
    }
}

fn print_help() {
    println!(
        "jade\n\nUSAGE:\n  jade <COMMAND>\n\nCOMMANDS:\n  compile <file> [--compact] [--line-numbers] [--func <name>]...\n  parse <file>\n  tokens <file>\n  dir <dir> [--ext .jade] [--flat]\n\nOPTIONS:\n  --config <jade.toml>  (defaults to ./jade.toml when present)\n  -h, --help"
    );
}

/// Settings shared by every command, after `jade.toml` and flags are applied.
struct Settings {
    options: Options,
    dir: DirOptions,
    target: Option<String>,
}

fn load_settings(args: &[String]) -> Result<Settings, JadeError> {
    let (config_path, args) = consume_value_flag(args, "--config")?;
    let config = match config_path {
        Some(path) => read_jade_toml(Path::new(&path))?,
        None if Path::new(CONFIG_FILE).is_file() => read_jade_toml(Path::new(CONFIG_FILE))?,
        None => JadeToml::default(),
    };

    let mut options = Options::default();
    config.apply(&mut options)?;
    let mut dir = config.dir_options();
    let mut target = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--compact" => options.pretty_print = false,
            "--line-numbers" => options.line_numbers = true,
            "--flat" => dir.recursive = false,
            "--func" => {
                let name = flag_value(iter.next(), "--func")?;
                options.functions.insert(name);
            }
            "--ext" => dir.extension = flag_value(iter.next(), "--ext")?,
            value if !value.starts_with('-') && target.is_none() => {
                target = Some(value.to_string());
            }
            other => {
                return Err(JadeError::InvalidCommand(format!(
                    "unexpected argument {other}"
                )))
            }
        }
    }

    Ok(Settings {
        options,
        dir,
        target,
    })
}

fn consume_value_flag(
    args: &[String],
    flag: &str,
) -> Result<(Option<String>, Vec<String>), JadeError> {
    let mut value = None;
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == flag {
            value = Some(flag_value(iter.next(), flag)?);
        } else {
            out.push(arg.clone());
        }
    }
    Ok((value, out))
}

fn flag_value(value: Option<&String>, flag: &str) -> Result<String, JadeError> {
    value
        .cloned()
        .ok_or_else(|| JadeError::InvalidCommand(format!("{flag} expects a value")))
}

fn require_target(settings: &Settings, command: &str) -> Result<String, JadeError> {
    settings
        .target
        .clone()
        .ok_or_else(|| JadeError::InvalidCommand(format!("{command} expects a path")))
}

fn cmd_compile(args: &[String]) -> Result<(), JadeError> {
    let settings = load_settings(args)?;
    let target = require_target(&settings, "compile")?;
    let mut compiler = Compiler::new(settings.options);
    compiler.parse_file(&target)?;
    let mut stdout = io::stdout().lock();
    compiler.compile_writer(&mut stdout)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_parse(args: &[String]) -> Result<(), JadeError> {
    let settings = load_settings(args)?;
    let target = require_target(&settings, "parse")?;
    let mut compiler = Compiler::new(settings.options);
    compiler.parse_file(&target)?;
    let output = serde_json::to_string_pretty(compiler.ast())
        .map_err(|err| JadeError::Io(io::Error::other(err)))?;
    println!("{output}");
    Ok(())
}

fn cmd_tokens(args: &[String]) -> Result<(), JadeError> {
    let settings = load_settings(args)?;
    let target = require_target(&settings, "tokens")?;
    let input = DiskSource::default()
        .read(&target, settings.options.path_separator)
        .map_err(|source| JadeError::Read {
            path: target.clone(),
            source,
        })?;
    let tokens = tokenize(&input, &target)?;
    let output = serde_json::to_string_pretty(&tokens)
        .map_err(|err| JadeError::Io(io::Error::other(err)))?;
    println!("{output}");
    Ok(())
}

fn cmd_dir(args: &[String]) -> Result<(), JadeError> {
    let settings = load_settings(args)?;
    let target = require_target(&settings, "dir")?;
    let compiled = compile_dir(&target, &settings.dir, &settings.options)?;
    let output = serde_json::to_string_pretty(&compiled)
        .map_err(|err| JadeError::Io(io::Error::other(err)))?;
    println!("{output}");
    Ok(())
}
