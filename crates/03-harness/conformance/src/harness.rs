//! Table-driven run over every enabled descriptor.

use std::io::Write;

use model_abi::{ClockedDevice, ReferenceModel};
use serde::Serialize;

use crate::assembler;
use crate::coverage::{Coverage, OpcodeSpace, Tally};
use crate::descriptor::InstructionDescriptor;
use crate::enumerator::{ImmediatePolicy, OperandSpace};
use crate::error::{Divergence, HarnessError};
use crate::oracle::{Oracle, Verdict};
use crate::report;
use crate::table::{PREFIXED, PRIMARY};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Verbosity {
    /// Totals and coverage only.
    #[default]
    Summary,
    /// One header and permutation count per descriptor.
    Verbose,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HarnessConfig {
    pub immediates: ImmediatePolicy,
    pub include_prefixed: bool,
    pub verbosity: Verbosity,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            immediates: ImmediatePolicy::default(),
            include_prefixed: true,
            verbosity: Verbosity::Summary,
        }
    }
}

/// Result of one instruction table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub space: OpcodeSpace,
    /// Enabled descriptors whose whole operand space matched.
    pub passed: usize,
    /// Rows in the table, disabled ones included.
    pub total: usize,
    pub permutations: u64,
    pub coverage: Tally,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub tables: Vec<TableSummary>,
}

impl RunSummary {
    pub fn permutations(&self) -> u64 {
        self.tables.iter().map(|t| t.permutations).sum()
    }

    pub fn table(&self, space: OpcodeSpace) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.space == space)
    }
}

pub struct Harness<R, D> {
    config: HarnessConfig,
    oracle: Oracle<R, D>,
    coverage: Coverage,
}

impl<R: ReferenceModel, D: ClockedDevice> Harness<R, D> {
    pub fn new(reference: R, device: D, config: HarnessConfig) -> Self {
        Self {
            config,
            oracle: Oracle::new(reference, device),
            coverage: Coverage::new(),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    fn tables(&self) -> Vec<(&'static [InstructionDescriptor], OpcodeSpace)> {
        let mut tables = vec![(PRIMARY, OpcodeSpace::Primary)];
        if self.config.include_prefixed {
            tables.push((PREFIXED, OpcodeSpace::Prefixed));
        }
        tables
    }

    /// Runs the configured tables, then prints coverage.
    ///
    /// Stops at the first divergence after writing its report to `out`.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<RunSummary, HarnessError> {
        let tables = self.tables();
        for (table, _) in &tables {
            for desc in table.iter() {
                desc.validate()?;
            }
        }

        let mut summary = RunSummary { tables: Vec::new() };
        for (table, space) in &tables {
            summary.tables.push(self.run_table(out, table, *space)?);
        }
        for (_, space) in &tables {
            report::write_coverage(out, &self.coverage, *space)?;
        }
        for table in &mut summary.tables {
            table.coverage = self.coverage.tally(table.space);
        }
        log::info!(
            "run complete: {} permutations across {} tables",
            summary.permutations(),
            summary.tables.len()
        );
        Ok(summary)
    }

    /// Runs every enabled row of `table`.
    pub fn run_table<W: Write>(
        &mut self,
        out: &mut W,
        table: &[InstructionDescriptor],
        space: OpcodeSpace,
    ) -> Result<TableSummary, HarnessError> {
        let verbose = self.config.verbosity == Verbosity::Verbose;
        let mut passed = 0;
        let mut permutations = 0;
        for desc in table {
            if verbose {
                report::write_instruction_header(out, desc)?;
            }
            if !desc.enabled {
                log::debug!("{}: disabled", desc.mnemonic);
                if verbose {
                    report::write_skipped(out)?;
                }
                continue;
            }
            let count = match self.test_instruction(desc) {
                Ok(count) => count,
                Err(HarnessError::Divergence(divergence)) => {
                    report::write_divergence(out, &divergence)?;
                    return Err(HarnessError::Divergence(divergence));
                }
                Err(err) => return Err(err.in_instruction(desc.mnemonic)),
            };
            if verbose {
                report::write_permutations(out, count)?;
            }
            permutations += count;
            passed += 1;
        }
        if verbose {
            writeln!(out)?;
        }
        report::write_table_summary(out, passed, table.len(), space)?;
        if verbose {
            writeln!(out)?;
        }
        Ok(TableSummary {
            space,
            passed,
            total: table.len(),
            permutations,
            coverage: self.coverage.tally(space),
        })
    }

    /// Compares every point of `desc`'s operand space; returns how many ran.
    pub fn test_instruction(&mut self, desc: &InstructionDescriptor) -> Result<u64, HarnessError> {
        let space = OpcodeSpace::of(desc.prefixed);
        let operands = OperandSpace::new(desc, self.config.immediates);
        log::debug!("{}: testing", desc.mnemonic);

        let mut count = 0;
        for assignment in operands.iter() {
            count += 1;
            let bytes = assembler::assemble(desc, &assignment);
            let input = operands.input_state(&assignment);
            log::trace!("{} {:02x?}", desc.mnemonic, bytes.as_slice());
            match self.oracle.check(&bytes, &input)? {
                Verdict::Match { .. } => {
                    self.coverage
                        .mark(space, assembler::opcode_byte(desc, &assignment));
                }
                Verdict::Mismatch(mismatch) => {
                    return Err(HarnessError::Divergence(Box::new(Divergence {
                        descriptor: *desc,
                        assignment,
                        mismatch: *mismatch,
                    })));
                }
            }
        }
        log::debug!("{}: {count} permutations", desc.mnemonic);
        Ok(count)
    }
}
