//! Integration tests running the `wspace` binary against fixture and temporary sources.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn ws(source: &str) -> Vec<u8> {
    source
        .chars()
        .filter_map(|c| match c {
            'S' => Some(b' '),
            'T' => Some(b'\t'),
            'L' => Some(b'\n'),
            _ => None,
        })
        .collect()
}

fn source_file(bytes: &[u8]) -> Result<NamedTempFile, Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;

    Ok(file)
}

#[allow(deprecated)]
fn wspace() -> Result<Command, Box<dyn std::error::Error>> {
    Ok(Command::cargo_bin("wspace")?)
}

#[test]
fn runs_hello_world() -> Result<(), Box<dyn std::error::Error>> {
    wspace()?
        .args(["-q", "-f", "resources/hello_world.ws"])
        .assert()
        .success()
        .stdout("Hello, World!\n")
        .stderr("");

    Ok(())
}

#[test]
fn reports_timings_unless_quiet() -> Result<(), Box<dyn std::error::Error>> {
    wspace()?
        .args(["-f", "resources/count.ws"])
        .assert()
        .success()
        .stdout("1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n")
        .stderr(predicate::str::contains("decoded 16 instructions and 2 labels"));

    Ok(())
}

#[test]
fn reads_program_input_from_stdin() -> Result<(), Box<dyn std::error::Error>> {
    wspace()?
        .args(["-q", "-f", "resources/factorial.ws"])
        .write_stdin("10\n")
        .assert()
        .success()
        .stdout("3628800\n");

    Ok(())
}

#[test]
fn ir_lists_instructions_without_running() -> Result<(), Box<dyn std::error::Error>> {
    wspace()?
        .args(["-q", "--ir", "-f", "resources/count.ws"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("     0  push 1\n     1  mark L2\n"))
        .stdout(predicate::str::contains("labels: 2\n  L2 -> 1\n  L3 -> 13\n"))
        .stdout(predicate::str::contains("1\n2\n3").not());

    Ok(())
}

#[test]
fn decode_error_exits_with_failure() -> Result<(), Box<dyn std::error::Error>> {
    // outputs 1 before the truncated push if it were executed
    let file = source_file(&ws("SSSTL TLST SSST"))?;
    wspace()?
        .arg("-q")
        .arg("-f")
        .arg(file.path())
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::starts_with(
            "error: decode error: unexpected end of input in number",
        ));

    Ok(())
}

#[test]
fn runtime_error_exits_with_failure() -> Result<(), Box<dyn std::error::Error>> {
    let file = source_file(&ws("LSLTL"))?;
    wspace()?
        .arg("-q")
        .arg("-f")
        .arg(file.path())
        .assert()
        .code(1)
        .stderr("error: runtime error: label L3 is not marked, referenced at instruction 0\n");

    Ok(())
}

#[test]
fn output_before_runtime_error_is_kept() -> Result<(), Box<dyn std::error::Error>> {
    let file = source_file(&ws("SSSTL TLST SSSL SSSL TSTS"))?;
    wspace()?
        .arg("-q")
        .arg("-f")
        .arg(file.path())
        .assert()
        .code(1)
        .stdout("1")
        .stderr(predicate::str::contains("division by zero at instruction 4"));

    Ok(())
}

#[test]
fn missing_source_file() -> Result<(), Box<dyn std::error::Error>> {
    wspace()?
        .args(["-q", "-f", "resources/does_not_exist.ws"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with(
            "error: failed to open resources/does_not_exist.ws",
        ));

    Ok(())
}

#[test]
fn file_argument_is_required() -> Result<(), Box<dyn std::error::Error>> {
    wspace()?.assert().failure();

    Ok(())
}

#[test]
fn zero_heap_reads_unwritten_cells() -> Result<(), Box<dyn std::error::Error>> {
    let file = source_file(&ws("SSSTL TTT TLST LLL"))?;
    wspace()?
        .arg("-q")
        .arg("-f")
        .arg(file.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "heap address 1 read before it was written",
        ));

    wspace()?
        .args(["-q", "-z", "-f"])
        .arg(file.path())
        .assert()
        .success()
        .stdout("0");

    Ok(())
}

#[test]
fn crlf_policy() -> Result<(), Box<dyn std::error::Error>> {
    let file = source_file(b"   \t\r\n\t\r\n \t\r\n\r\n\r\n")?;
    wspace()?
        .arg("-q")
        .arg("-f")
        .arg(file.path())
        .assert()
        .success()
        .stdout("1");

    wspace()?
        .args(["-q", "--per-byte-crlf", "-f"])
        .arg(file.path())
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::starts_with("error: decode error"));

    Ok(())
}

#[test]
fn debug_traces_to_stderr() -> Result<(), Box<dyn std::error::Error>> {
    let file = source_file(&ws("SSSTL TLST LLL"))?;
    wspace()?
        .args(["-q", "-d", "-m", "-f"])
        .arg(file.path())
        .assert()
        .success()
        .stdout("1")
        .stderr(predicate::str::contains(
            "[     1] outn             stack: [1] calls: []",
        ))
        .stderr(predicate::str::contains("heap: {}"));

    Ok(())
}
