//! Top-level simulator.
//!
//! Owns the trace-driven cores and the memory hierarchy side-by-side
//! and advances both each tick: cores retire and dispatch first, then
//! the hierarchy drains and completes, and fills flow back into the
//! windows. The run ends when every trace is exhausted and
//! `pending_requests` has drained to zero.
//!
//! Both trace forms drive the same stack. CPU traces go through the
//! cores' windows and the per-core address mapper; memory traces inject
//! one reference per stream per tick straight into the L1Ds, retrying
//! refusals.

use tracing::info;

use crate::common::{Request, Requester, SimError, Tick};
use crate::config::Config;
use crate::sim::hierarchy::Hierarchy;
use crate::sim::processor::Core;
use crate::sim::stats::Stats;
use crate::sim::trace::{Trace, TraceKind};

/// One memory-trace injection stream.
struct MemStream {
    core_id: usize,
    trace: Trace,
    stalled: Option<Request>,
    exhausted: bool,
    sent: u64,
}

impl MemStream {
    /// Sends at most one reference into the hierarchy this tick.
    fn step(&mut self, hierarchy: &mut Hierarchy) -> Result<(), SimError> {
        let req = match self.stalled.take() {
            Some(req) => req,
            None => {
                if self.exhausted {
                    return Ok(());
                }
                match self.trace.next_memtrace_request()? {
                    Some((addr, kind)) => {
                        let mut req = Request::with_requester(addr, kind, Requester::None);
                        req.core_id = self.core_id;
                        req
                    }
                    None => {
                        self.exhausted = true;
                        return Ok(());
                    }
                }
            }
        };

        if hierarchy.send_core_request(self.core_id, req.clone()) {
            self.sent += 1;
        } else {
            self.stalled = Some(req);
        }
        Ok(())
    }

    fn done(&self) -> bool {
        self.exhausted && self.stalled.is_none()
    }
}

/// What drives the hierarchy.
enum Drive {
    /// CPU traces through retirement windows.
    Cpu(Vec<Core>),
    /// Raw memory references, one per stream per tick.
    Memory(Vec<MemStream>),
}

/// Figures reported at the end of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// On-chip ticks simulated, drain included.
    pub cycles: Tick,
    /// Instructions (CPU traces) or references (memory traces) retired.
    pub retired: u64,
}

/// Top-level simulator: cores plus hierarchy.
pub struct Simulator {
    drive: Drive,
    hierarchy: Hierarchy,
    clk: Tick,
}

impl Simulator {
    /// Builds the full system. One trace file per core; all traces must
    /// share one form, detected from the first file. With a DRAM
    /// configuration the main memory is the hybrid arrangement.
    ///
    /// # Errors
    ///
    /// Propagates trace open/parse failures.
    pub fn new(
        dram_cfg: Option<&Config>,
        pcm_cfg: &Config,
        trace_paths: &[String],
    ) -> Result<Self, SimError> {
        let Some(first_trace) = trace_paths.first() else {
            return Err(SimError::trace("<none>", 0, "no trace files supplied"));
        };
        let num_cores = trace_paths.len();
        let hierarchy = Hierarchy::new(dram_cfg, pcm_cfg, num_cores);

        let kind = Trace::detect_kind(first_trace)?;
        info!(?kind, cores = num_cores, "simulation bring-up");

        let drive = match kind {
            TraceKind::Cpu => {
                let cores = trace_paths
                    .iter()
                    .enumerate()
                    .map(|(i, path)| Core::new(i, path, pcm_cfg.block_size))
                    .collect::<Result<Vec<_>, _>>()?;
                Drive::Cpu(cores)
            }
            TraceKind::Memory => {
                let streams = trace_paths
                    .iter()
                    .enumerate()
                    .map(|(i, path)| {
                        Ok(MemStream {
                            core_id: i,
                            trace: Trace::open(path)?,
                            stalled: None,
                            exhausted: false,
                            sent: 0,
                        })
                    })
                    .collect::<Result<Vec<_>, SimError>>()?;
                Drive::Memory(streams)
            }
        };

        Ok(Self {
            drive,
            hierarchy,
            clk: 0,
        })
    }

    /// The hierarchy, for inspection.
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Attaches a per-request probe recording every memory completion.
    pub fn attach_request_probe(&mut self, probe: crate::sim::probe::RequestProbe) {
        self.hierarchy.attach_request_probe(probe);
    }

    /// Advances the whole system one tick.
    ///
    /// # Errors
    ///
    /// Propagates trace parse failures.
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.clk += 1;

        match &mut self.drive {
            Drive::Cpu(cores) => {
                for (i, core) in cores.iter_mut().enumerate() {
                    core.tick(self.hierarchy.l1d_mut(i))?;
                }
            }
            Drive::Memory(streams) => {
                for stream in streams.iter_mut() {
                    stream.step(&mut self.hierarchy)?;
                }
            }
        }

        let fills = self.hierarchy.tick();
        if let Drive::Cpu(cores) = &mut self.drive {
            for (core_id, addr) in fills {
                cores[core_id].notify_fill(addr);
            }
        }

        Ok(())
    }

    fn sources_done(&self) -> bool {
        match &self.drive {
            Drive::Cpu(cores) => cores.iter().all(Core::done),
            Drive::Memory(streams) => streams.iter().all(MemStream::done),
        }
    }

    /// Runs to trace exhaustion, then drains every outstanding request.
    ///
    /// # Errors
    ///
    /// Propagates trace parse failures.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        while !self.sources_done() {
            self.tick()?;
        }
        while self.hierarchy.pending_requests() > 0 {
            self.tick()?;
        }

        let retired = match &self.drive {
            Drive::Cpu(cores) => cores.iter().map(Core::retired).sum(),
            Drive::Memory(streams) => streams.iter().map(|s| s.sent).sum(),
        };
        self.hierarchy.flush_probe();
        info!(cycles = self.clk, retired, "simulation complete");

        Ok(RunSummary {
            cycles: self.clk,
            retired,
        })
    }

    /// Registers everything: cores, caches, channels, and the run
    /// summary lines.
    pub fn register_stats(&self, stats: &mut Stats) {
        if let Drive::Cpu(cores) = &self.drive {
            for core in cores {
                core.register_stats(stats);
            }
        }
        self.hierarchy.register_stats(stats);

        let retired: u64 = match &self.drive {
            Drive::Cpu(cores) => cores.iter().map(Core::retired).sum(),
            Drive::Memory(streams) => streams.iter().map(|s| s.sent).sum(),
        };
        stats.register("Number of retired references", retired);
        stats.register("Execution Time (cycles)", self.clk);
    }
}
