//! Owned program/kernel cache for a compute device.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::error::Result;

/// A device that can build programs and run the lane decode kernel.
///
/// Handles are opaque to the codec. Any failure to reach the device, build a
/// program or dispatch a kernel should be reported as
/// [`Error::BackendUnavailable`](crate::Error::BackendUnavailable).
pub trait ComputeDevice {
    /// A compiled program.
    type Program;
    /// A kernel created from a program. Handles are cheap to clone.
    type Kernel: Clone;
    /// A decode table resident on the device.
    type Table;

    /// Device name for diagnostics.
    fn name(&self) -> &str;

    /// Compile the program identified by `source_id`.
    fn build_program(&self, source_id: &str) -> Result<Self::Program>;

    /// Create the kernel `kernel_name` from `program`.
    fn create_kernel(&self, program: &Self::Program, kernel_name: &str) -> Result<Self::Kernel>;

    /// Run the table-building kernel over normalized frequencies.
    fn upload_table(
        &self,
        kernel: &Self::Kernel,
        freqs: &[u32],
        precision_bits: u32,
    ) -> Result<Self::Table>;

    /// Run the decode kernel over one group, one thread per lane.
    fn dispatch_decode(
        &self,
        kernel: &Self::Kernel,
        table: &Self::Table,
        states: &[u32],
        words: &[u16],
        symbols_per_lane: usize,
    ) -> Result<Vec<Vec<u8>>>;
}

struct CachedProgram<D: ComputeDevice> {
    program: D::Program,
    kernels: HashMap<String, D::Kernel>,
}

/// Memoizes compiled programs and kernels for one device.
///
/// Lookups are keyed by `(source_id, kernel_name)`. Compilation happens under
/// the cache lock, so concurrent callers asking for the same kernel compile
/// it once. Cached handles live until [`clear`](Self::clear) or drop.
pub struct KernelCache<D: ComputeDevice> {
    device: D,
    programs: Mutex<HashMap<String, CachedProgram<D>>>,
}

impl<D: ComputeDevice> KernelCache<D> {
    /// Empty cache over `device`.
    pub fn new(device: D) -> Self {
        Self {
            device,
            programs: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Get the kernel `kernel_name` from program `source_id`, building
    /// either on first use.
    pub fn get_kernel(&self, source_id: &str, kernel_name: &str) -> Result<D::Kernel> {
        let mut programs = self.lock();
        let entry = match programs.entry(source_id.to_owned()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                debug!(device = self.device.name(), source_id, "building program");
                let program = self.device.build_program(source_id)?;
                e.insert(CachedProgram {
                    program,
                    kernels: HashMap::new(),
                })
            }
        };

        if let Some(kernel) = entry.kernels.get(kernel_name) {
            trace!(source_id, kernel_name, "kernel cache hit");
            return Ok(kernel.clone());
        }

        debug!(device = self.device.name(), source_id, kernel_name, "creating kernel");
        let kernel = self.device.create_kernel(&entry.program, kernel_name)?;
        entry.kernels.insert(kernel_name.to_owned(), kernel.clone());
        Ok(kernel)
    }

    /// Number of cached programs.
    pub fn program_count(&self) -> usize {
        self.lock().len()
    }

    /// Number of cached kernels across all programs.
    pub fn kernel_count(&self) -> usize {
        self.lock().values().map(|p| p.kernels.len()).sum()
    }

    /// Release every cached program and kernel.
    pub fn clear(&self) {
        let mut programs = self.lock();
        debug!(
            device = self.device.name(),
            programs = programs.len(),
            "clearing kernel cache"
        );
        programs.clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedProgram<D>>> {
        // A panic mid-build leaves at worst a missing entry; the map is still valid.
        self.programs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: ComputeDevice + std::fmt::Debug> std::fmt::Debug for KernelCache<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCache")
            .field("device", &self.device)
            .field("programs", &self.program_count())
            .finish()
    }
}
