use clap::{Arg, ArgMatches, Command};
use std::io::{stderr, stdout, Write};
use std::process::ExitCode;
use std::time::Instant;
use wspace::ws::trace;
use wspace::{decode_with, source, DecoderConfig, Error, HeapPolicy, LineEndings, Vm, VmConfig};

fn args() -> ArgMatches {
    Command::new("wspace")
        .about("a whitespace interpreter")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .takes_value(true)
                .required(true)
                .help("whitespace source file to interpret"),
        )
        .arg(
            Arg::new("ir")
                .short('i')
                .long("ir")
                .takes_value(false)
                .help("prints the decoded instructions and label table instead of running"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .takes_value(false)
                .help("prints the instruction and both stacks before each executed instruction"),
        )
        .arg(
            Arg::new("debug-heap")
                .short('m')
                .long("debug-heap")
                .takes_value(false)
                .help("prints a heap dump before each executed instruction"),
        )
        .arg(
            Arg::new("zero-heap")
                .short('z')
                .long("zero-heap")
                .takes_value(false)
                .help("reads of never written heap addresses yield 0 instead of failing"),
        )
        .arg(
            Arg::new("per-byte-crlf")
                .long("per-byte-crlf")
                .takes_value(false)
                .help("counts CR and LF of a CRLF pair as two line terminators"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .takes_value(false)
                .help("suppresses all output other than what the whitespace program is producing"),
        )
        .get_matches()
}

fn status(quiet: bool, msg: &str) {
    if !quiet {
        let _ = writeln!(stderr(), "{}", msg);
    }
}

fn execute(args: &ArgMatches) -> Result<(), Error> {
    let quiet = args.is_present("quiet");
    let decoder = DecoderConfig {
        line_endings: if args.is_present("per-byte-crlf") {
            LineEndings::PerByte
        } else {
            LineEndings::Collapse
        },
    };
    let heap_policy = if args.is_present("zero-heap") {
        HeapPolicy::ZeroFill
    } else {
        HeapPolicy::Strict
    };
    let config = VmConfig::new(
        heap_policy,
        args.is_present("debug"),
        args.is_present("debug-heap"),
    );

    let file_name = args.value_of("file").unwrap_or_default();
    status(quiet, &format!("loading and decoding {}...", file_name));
    let start = Instant::now();
    let source = source::load(file_name)?;
    let program = decode_with(&source, decoder)?;
    let elapsed = start.elapsed();
    status(
        quiet,
        &format!(
            "decoded {} instructions and {} labels in {} ms ({} ns)",
            program.len(),
            program.labels().len(),
            elapsed.as_millis(),
            elapsed.as_nanos()
        ),
    );

    if args.is_present("ir") {
        let mut out = stdout().lock();
        trace::program(&mut out, &program)?;
        out.flush()?;
        return Ok(());
    }

    status(quiet, "starting to execute whitespace routine...");
    let start = Instant::now();
    let mut vm = Vm::stdio(program, config);
    let result = vm.run();
    let elapsed = start.elapsed();
    status(
        quiet,
        &format!(
            "\nroutine took {} ms ({} ns)",
            elapsed.as_millis(),
            elapsed.as_nanos()
        ),
    );

    Ok(result?)
}

fn main() -> ExitCode {
    let args = args();
    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = writeln!(stderr(), "error: {}", err);
            ExitCode::FAILURE
        }
    }
}
