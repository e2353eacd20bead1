//! Process-wide read-through cache of taper sets.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::{DpssConfig, DpssKernel, TaperSet};
use crate::kernel::{ExecInvariantViolation, KernelLifecycle};
use crate::signal::traits::DpssGenerate;

type TaperKey = (usize, u64, usize);

struct TaperCache {
    entries: RwLock<HashMap<TaperKey, Arc<TaperSet>>>,
}

impl TaperCache {
    fn global() -> &'static TaperCache {
        static INSTANCE: OnceLock<TaperCache> = OnceLock::new();
        INSTANCE.get_or_init(|| TaperCache {
            entries: RwLock::new(HashMap::new()),
        })
    }

    fn get_or_generate(
        &self,
        kernel: &DpssKernel,
    ) -> Result<Arc<TaperSet>, ExecInvariantViolation> {
        let key = kernel.key();
        if let Some(existing) = self.entries.read().get(&key) {
            tracing::debug!(n = key.0, n_tapers = key.2, "taper cache hit");
            return Ok(Arc::clone(existing));
        }

        // Generated outside the write lock; a racing writer may win, in which
        // case its set is returned and ours is dropped.
        let generated = Arc::new(kernel.run_alloc()?);
        tracing::debug!(n = key.0, n_tapers = key.2, "taper cache miss");
        let mut entries = self.entries.write();
        Ok(Arc::clone(entries.entry(key).or_insert(generated)))
    }
}

/// [`dpss_windows`](super::dpss_windows) through a process-wide cache keyed by
/// `(N, NW, K)`.
///
/// Returned sets are shared and immutable. Arguments are validated before the
/// cache is consulted, so invalid requests never populate it. Entries are never
/// evicted; they live until [`clear_taper_cache`] is called.
pub fn dpss_windows_cached(n: usize, nw: f64, n_tapers: usize) -> crate::Result<Arc<TaperSet>> {
    let kernel = DpssKernel::try_new(DpssConfig { n, nw, n_tapers })?;
    Ok(cached_tapers(&kernel)?)
}

pub(crate) fn cached_tapers(kernel: &DpssKernel) -> Result<Arc<TaperSet>, ExecInvariantViolation> {
    TaperCache::global().get_or_generate(kernel)
}

/// Drop every cached taper set.
pub fn clear_taper_cache() {
    TaperCache::global().entries.write().clear();
}
