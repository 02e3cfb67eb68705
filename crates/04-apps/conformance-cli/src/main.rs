//! Command-line front end for the SM83 conformance harness.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use conformance::{
    self_check, trace, Fault, Harness, HarnessConfig, HarnessError, ImmediatePolicy,
    InstructionDescriptor, ProgramFormat, TraceConfig, Verbosity, PREFIXED, PRIMARY,
};
use model_abi::FlatMemory;
use ref_cpu::RefCpu;
use rtl_cpu::RtlCpu;
use std::fs;
use std::io;
use std::num::NonZeroU16;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit status when the device diverged or stopped; harness defects exit 1.
const DEVICE_FAILURE_STATUS: u8 = 2;

/// Text rendering helpers used by the CLI commands.
mod render {
    use conformance::{FaultOutcome, OpcodeSpace, RunSummary, TraceEnd, TraceSummary};
    use std::fmt::Write;

    fn space_name(space: OpcodeSpace) -> &'static str {
        match space {
            OpcodeSpace::Primary => "primary",
            OpcodeSpace::Prefixed => "prefixed",
        }
    }

    /// Per-table totals printed after the harness' own report.
    pub fn run_summary(summary: &RunSummary) -> String {
        let mut out = String::new();
        for table in &summary.tables {
            writeln!(
                out,
                "{:<9} {}/{} instructions  {}/{} opcodes  {} permutations",
                space_name(table.space),
                table.passed,
                table.total,
                table.coverage.tested,
                table.coverage.valid,
                table.permutations
            )
            .expect("write table");
        }
        writeln!(out, "Total permutations: {}", summary.permutations()).expect("write total");
        out
    }

    /// One line per injected fault.
    pub fn self_check(instruction: &str, outcomes: &[FaultOutcome]) -> String {
        let mut out = String::new();
        writeln!(out, "Self-check on {instruction}").expect("write header");
        for outcome in outcomes {
            let fault = format!("{:?}", outcome.fault);
            let status = if outcome.caught() { "caught" } else { "MISSED" };
            let fields = if outcome.fields.is_empty() {
                "-".to_string()
            } else {
                outcome.fields.join(", ")
            };
            writeln!(out, "  {fault:<20} {status:<7} {fields}").expect("write fault");
        }
        let caught = outcomes.iter().filter(|o| o.caught()).count();
        writeln!(out, "{caught}/{} faults caught", outcomes.len()).expect("write tally");
        out
    }

    pub fn trace_summary(summary: &TraceSummary) -> String {
        let end = match summary.end {
            TraceEnd::Halted => "halted",
            TraceEnd::Finished => "simulation finished",
            TraceEnd::Limit => "instruction limit",
        };
        format!(
            "Trace ended ({end}) after {} instruction(s), {} cycles\n",
            summary.instructions, summary.cycles
        )
    }
}

/// Differential conformance testing of SM83 CPU models.
#[derive(Parser, Debug)]
#[command(author, version, about = "Compare an SM83 device model against the reference", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every enabled instruction through both models.
    Run(RunArgs),
    /// Check that injected reference faults are reported.
    SelfCheck {
        /// Table mnemonic of the instruction to run (e.g. "PUSH rr").
        #[arg(short, long, default_value = "NOP")]
        instruction: String,
        /// Print outcomes as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run a program on the device model and print registers per instruction.
    Trace {
        /// Program image, loaded at address 0.
        #[arg(value_name = "PROGRAM")]
        program: PathBuf,
        /// Treat the program as hex text (implied by a `.hex` extension).
        #[arg(long)]
        hex: bool,
        /// Stop after this many instructions.
        #[arg(short = 'n', long, value_parser = parse_u32, default_value_t = 100_000)]
        max_instructions: u32,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Print every instruction and its permutation count.
    #[arg(short, long)]
    verbose: bool,
    /// Leave out the 0xCB-prefixed table.
    #[arg(long)]
    skip_prefixed: bool,
    /// Enumerate every 2-byte immediate.
    #[arg(long, conflicts_with = "stride")]
    exhaustive: bool,
    /// Stride for sampled 2-byte immediates (decimal or hex).
    #[arg(long, value_parser = parse_u16)]
    stride: Option<u16>,
    /// Print the run summary as JSON; the report goes to stderr.
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn config(&self) -> Result<HarnessConfig> {
        let immediates = match (self.exhaustive, self.stride) {
            (true, _) => ImmediatePolicy::Exhaustive,
            (false, Some(stride)) => ImmediatePolicy::Sampled {
                stride: NonZeroU16::new(stride).context("stride must be non-zero")?,
            },
            (false, None) => ImmediatePolicy::default(),
        };
        Ok(HarnessConfig {
            immediates,
            include_prefixed: !self.skip_prefixed,
            verbosity: if self.verbose {
                Verbosity::Verbose
            } else {
                Verbosity::Summary
            },
        })
    }
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(&args),
        Command::SelfCheck { instruction, json } => {
            handle_self_check(&instruction, json).map(|()| ExitCode::SUCCESS)
        }
        Command::Trace {
            program,
            hex,
            max_instructions,
        } => handle_trace(&program, hex, max_instructions).map(|()| ExitCode::SUCCESS),
    }
}

/// Splits run failures into device failures, which get their own status,
/// and everything else.
fn failure_status(err: &HarnessError) -> Option<u8> {
    err.is_device_failure().then_some(DEVICE_FAILURE_STATUS)
}

fn handle_run(args: &RunArgs) -> Result<ExitCode> {
    let config = args.config()?;
    log::debug!("run config: {config:?}");
    let mut harness = Harness::new(RefCpu::new(), RtlCpu::new(), config);
    let result = if args.json {
        harness.run(&mut io::stderr().lock())
    } else {
        harness.run(&mut io::stdout().lock())
    };
    let summary = match result {
        Ok(summary) => summary,
        Err(err) => match failure_status(&err) {
            Some(status) => {
                eprintln!("conformance run failed: {err}");
                return Ok(ExitCode::from(status));
            }
            None => return Err(err).context("conformance run failed"),
        },
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render::run_summary(&summary));
    }
    Ok(ExitCode::SUCCESS)
}

fn find_instruction(mnemonic: &str) -> Result<InstructionDescriptor> {
    PRIMARY
        .iter()
        .chain(PREFIXED)
        .find(|desc| desc.mnemonic.eq_ignore_ascii_case(mnemonic))
        .copied()
        .with_context(|| format!("no instruction named {mnemonic:?}"))
}

fn handle_self_check(mnemonic: &str, json: bool) -> Result<()> {
    let desc = find_instruction(mnemonic)?;
    let faults = Fault::catalogue();
    let outcomes = self_check(RefCpu::new(), RtlCpu::new(), &desc, &faults)
        .context("clean run of the self-check instruction failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        print!("{}", render::self_check(desc.mnemonic, &outcomes));
    }
    let missed = outcomes.iter().filter(|o| !o.caught()).count();
    if missed > 0 {
        bail!("{missed} of {} faults were not caught", outcomes.len());
    }
    Ok(())
}

fn handle_trace(path: &Path, hex: bool, max_instructions: u32) -> Result<()> {
    let raw = fs::read(path).with_context(|| format!("failed to read program {path:?}"))?;
    let format = if hex || path.extension().is_some_and(|ext| ext == "hex") {
        ProgramFormat::HexText
    } else {
        ProgramFormat::Binary
    };
    let image = conformance::load_program(&raw, format)?;
    let mut mem = FlatMemory::with_image(&image);
    let mut device = RtlCpu::new();
    let config = TraceConfig {
        max_instructions: u64::from(max_instructions),
    };
    let summary = trace(&mut device, &mut mem, config, &mut io::stdout().lock())?;
    print!("{}", render::trace_summary(&summary));
    Ok(())
}

fn parse_u16(input: &str) -> Result<u16, String> {
    if let Some(stripped) = input.strip_prefix("0x") {
        u16::from_str_radix(stripped, 16).map_err(|_| format!("invalid hex value '{input}'"))
    } else {
        input
            .parse::<u16>()
            .map_err(|_| format!("invalid number '{input}'"))
    }
}

fn parse_u32(input: &str) -> Result<u32, String> {
    if let Some(stripped) = input.strip_prefix("0x") {
        u32::from_str_radix(stripped, 16).map_err(|_| format!("invalid hex value '{input}'"))
    } else {
        input
            .parse::<u32>()
            .map_err(|_| format!("invalid number '{input}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::{failure_status, parse_u16, render, Cli, DEVICE_FAILURE_STATUS};
    use clap::Parser;
    use conformance::{
        Fault, FaultOutcome, HarnessError, OpcodeSpace, RunSummary, TableSummary, Tally,
        TraceEnd, TraceSummary,
    };
    use insta::assert_snapshot;

    fn sample_summary() -> RunSummary {
        RunSummary {
            tables: vec![
                TableSummary {
                    space: OpcodeSpace::Primary,
                    passed: 74,
                    total: 74,
                    permutations: 108_160,
                    coverage: Tally {
                        tested: 244,
                        valid: 244,
                    },
                },
                TableSummary {
                    space: OpcodeSpace::Prefixed,
                    passed: 11,
                    total: 11,
                    permutations: 34_496,
                    coverage: Tally {
                        tested: 256,
                        valid: 256,
                    },
                },
            ],
        }
    }

    #[test]
    fn run_summary_render_matches_expectation() {
        assert_snapshot!("run_summary_render", render::run_summary(&sample_summary()));
    }

    #[test]
    fn self_check_render_matches_expectation() {
        let outcomes = [
            FaultOutcome {
                fault: Fault::FlagBit(7),
                fields: vec!["F.Z"],
            },
            FaultOutcome {
                fault: Fault::StackPointer,
                fields: vec!["SP", "bus"],
            },
            FaultOutcome {
                fault: Fault::InterruptEnable,
                fields: Vec::new(),
            },
        ];
        assert_snapshot!(
            "self_check_render",
            render::self_check("PUSH rr", &outcomes)
        );
    }

    #[test]
    fn trace_summary_render_matches_expectation() {
        let summary = TraceSummary {
            instructions: 5,
            cycles: 23,
            end: TraceEnd::Halted,
        };
        assert_snapshot!("trace_summary_render", render::trace_summary(&summary));
    }

    #[test]
    fn stride_accepts_hex() {
        assert_eq!(parse_u16("0x0101"), Ok(0x0101));
        assert_eq!(parse_u16("257"), Ok(257));
        assert!(parse_u16("0xZZ").is_err());
    }

    #[test]
    fn device_failures_get_their_own_status() {
        let finished = HarnessError::SimulationFinished {
            mnemonic: "INC r",
            cycles: 64,
        };
        assert_eq!(failure_status(&finished), Some(DEVICE_FAILURE_STATUS));

        let io = HarnessError::Io(std::io::Error::other("closed"));
        assert_eq!(failure_status(&io), None);
    }

    #[test]
    fn exhaustive_conflicts_with_stride() {
        let result = Cli::try_parse_from(["sm83-conformance", "run", "--exhaustive", "--stride", "4"]);
        assert!(result.is_err());
    }
}
