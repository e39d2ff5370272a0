use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use krill::{KrillError, Lexer, TokenKind};

mod cli;

/// Minimal logger over the `log` facade: warnings from the lexer (unknown
/// escapes and the like) go to stderr; `-v` turns on debug messages too.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("krill: {}", record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn run(opts: &cli::Options) -> Result<(), KrillError> {
    let mut lexer = Lexer::new(&opts.input)?;
    let mut out: Box<dyn Write> = match &opts.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };
    loop {
        let tok = lexer.next_token()?;
        if tok.is_eof() {
            break;
        }
        if opts.dump {
            writeln!(out, "{}", tok.describe())?;
        } else if matches!(tok.kind, TokenKind::Newline) {
            writeln!(out)?;
        } else {
            if tok.space {
                write!(out, " ")?;
            }
            write!(out, "{tok}")?;
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let opts = match cli::Options::parse(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("krill: {msg}");
            eprintln!("{}", cli::Options::usage());
            return ExitCode::FAILURE;
        }
    };
    if opts.help {
        println!("{}", cli::Options::usage());
        return ExitCode::SUCCESS;
    }
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(if opts.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    });
    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("krill: {err}");
            ExitCode::FAILURE
        }
    }
}
