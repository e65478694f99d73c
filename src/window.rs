//! Windows over graph paths with MinHash signatures.
//!
//! [`GrootGraph::window_graph`] slides fixed-size windows along every path of the graph.
//! For each window, it hashes all k-mers and keeps the smallest distinct hash values as the signature.
//! Windows whose signature has already been emitted are dropped, as they cannot tell the paths apart.
//!
//! Generation happens in a background thread that sends windows through a bounded channel.
//! The caller consumes them through [`WindowStream`], which stops and joins the producer when it is cancelled or dropped.

use crate::graph::PathSegment;
use crate::{GraphError, GrootGraph, Result};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::debug;


//-----------------------------------------------------------------------------

/// A shared flag for stopping window generation early.
///
/// Clones refer to the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a new token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A set of signatures shared by several window generators.
///
/// Clones refer to the same set, which makes signature uniqueness span all graphs using it.
#[derive(Clone, Debug, Default)]
pub struct SignatureRegistry(Arc<Mutex<HashSet<Vec<u64>>>>);

impl SignatureRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the signature is in the registry.
    pub fn contains(&self, signature: &[u64]) -> bool {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).contains(signature)
    }

    /// Inserts the signature and returns `true` if it was not present.
    pub fn insert(&self, signature: &[u64]) -> bool {
        let mut signatures = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if signatures.contains(signature) {
            false
        } else {
            signatures.insert(signature.to_vec())
        }
    }

    /// Returns the number of signatures in the registry.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Returns `true` if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scope of duplicate signature suppression.
#[derive(Clone, Debug, Default)]
pub enum Uniqueness {
    /// Signatures are unique among the windows of a single call.
    #[default]
    PerGraph,
    /// Signatures are unique among all calls sharing the registry.
    ///
    /// A signature is registered when the consumer receives its window.
    Shared(SignatureRegistry),
}

//-----------------------------------------------------------------------------

/// Parameters for [`GrootGraph::window_graph`].
#[derive(Clone, Debug)]
pub struct WindowParams {
    /// Length of each window in bp.
    pub window_size: usize,
    /// Length of the hashed k-mers, at most `window_size` and [`WindowParams::MAX_K`].
    pub k_size: usize,
    /// Maximum number of hash values in a signature.
    pub sig_size: usize,
    /// Distance between the starts of consecutive windows on a path.
    pub step: usize,
    /// Number of windows buffered between the producer and the consumer.
    pub channel_capacity: usize,
    /// Scope of duplicate signature suppression.
    pub uniqueness: Uniqueness,
    /// Optional external cancellation signal.
    pub cancel: Option<CancellationToken>,
}

impl WindowParams {
    /// Longest supported k-mer.
    pub const MAX_K: usize = 32;

    /// Default window size.
    pub const WINDOW_SIZE: usize = 100;

    /// Default k-mer length.
    pub const K_SIZE: usize = 7;

    /// Default signature size.
    pub const SIG_SIZE: usize = 128;

    /// Default channel capacity.
    pub const CHANNEL_CAPACITY: usize = 64;

    /// Creates parameters with the given sizes and default values for everything else.
    pub fn new(window_size: usize, k_size: usize, sig_size: usize) -> Self {
        WindowParams { window_size, k_size, sig_size, ..Self::default() }
    }

    /// Checks the parameters.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.k_size == 0 || self.sig_size == 0 {
            return Err(GraphError::InvalidWindowConfig(format!(
                "Window size {}, k-mer size {}, and signature size {} must be positive",
                self.window_size, self.k_size, self.sig_size
            )));
        }
        if self.k_size > self.window_size {
            return Err(GraphError::InvalidWindowConfig(format!(
                "K-mer size {} exceeds window size {}", self.k_size, self.window_size
            )));
        }
        if self.k_size > Self::MAX_K {
            return Err(GraphError::InvalidWindowConfig(format!(
                "K-mer size {} exceeds the maximum {}", self.k_size, Self::MAX_K
            )));
        }
        if self.step == 0 {
            return Err(GraphError::InvalidWindowConfig(String::from("Window step must be positive")));
        }
        Ok(())
    }
}

impl Default for WindowParams {
    fn default() -> Self {
        WindowParams {
            window_size: Self::WINDOW_SIZE,
            k_size: Self::K_SIZE,
            sig_size: Self::SIG_SIZE,
            step: 1,
            channel_capacity: Self::CHANNEL_CAPACITY,
            uniqueness: Uniqueness::default(),
            cancel: None,
        }
    }
}

//-----------------------------------------------------------------------------

/// A window over a path with its signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Window {
    /// Path identifier.
    pub path_id: usize,
    /// Start offset in the path sequence.
    pub start: usize,
    /// Past-the-end offset in the path sequence.
    pub end: usize,
    /// Node containing the first base of the window.
    pub node_id: usize,
    /// Offset of the first base in that node.
    pub node_offset: usize,
    /// Distinct hash values in ascending order.
    pub signature: Vec<u64>,
}

impl Window {
    /// Returns the length of the window.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

//-----------------------------------------------------------------------------

// A resolved path with node coordinates, owned by the producer thread.
struct PathTrack {
    path_id: usize,
    sequence: Vec<u8>,
    // (path offset, node id, node offset) for each walk step.
    steps: Vec<(usize, usize, usize)>,
}

impl PathTrack {
    fn new(graph: &GrootGraph, path_id: usize) -> Result<Self> {
        let segments: Vec<PathSegment> = graph.path_segments(path_id)?;
        let sequence = graph.graph2seq(path_id)?;
        let steps = segments.iter().map(|segment| {
            (segment.path_offset, graph.sorted_nodes()[segment.rank].id(), segment.node_offset)
        }).collect();
        Ok(PathTrack { path_id, sequence, steps })
    }

    // Returns the node id and the offset in the node for the given path offset.
    fn locate(&self, offset: usize) -> (usize, usize) {
        let index = self.steps.partition_point(|step| step.0 <= offset).saturating_sub(1);
        let (path_offset, node_id, node_offset) = self.steps[index];
        (node_id, node_offset + (offset - path_offset))
    }
}

/// Returns the `(start, end)` bounds of the windows over a sequence of length `len`.
///
/// Windows start at multiples of `step` and end no later than `len`.
/// A sequence shorter than the window but at least `k_size` bp long gets a single window covering all of it.
pub fn window_bounds(len: usize, params: &WindowParams) -> Vec<(usize, usize)> {
    if len < params.window_size {
        if len >= params.k_size && len > 0 {
            return vec![(0, len)];
        }
        return Vec::new();
    }
    (0..=(len - params.window_size)).step_by(params.step.max(1)).map(|start| (start, start + params.window_size)).collect()
}

//-----------------------------------------------------------------------------

/// Lazy sequence of windows produced by a background thread.
///
/// Iteration blocks until the next window is available and ends when the producer is done.
/// Calling [`WindowStream::cancel`] or dropping the stream stops the producer and waits for it to exit.
/// Windows that were buffered but never returned do not count as emitted.
#[derive(Debug)]
pub struct WindowStream {
    receiver: Option<Receiver<Window>>,
    stop: CancellationToken,
    producer: Option<JoinHandle<()>>,
    registry: Option<SignatureRegistry>,
}

impl WindowStream {
    /// Stops the producer and waits for it to finish.
    ///
    /// No further windows will be returned.
    pub fn cancel(&mut self) {
        self.stop.cancel();
        // Dropping the receiver unblocks a producer waiting on a full channel.
        self.receiver = None;
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                debug!("Window producer panicked");
            }
        }
    }
}

impl Iterator for WindowStream {
    type Item = Window;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let window = self.receiver.as_ref()?.recv().ok()?;
            // Another stream sharing the registry may have emitted the signature after the producer checked it.
            match self.registry.as_ref() {
                Some(registry) if !registry.insert(&window.signature) => continue,
                _ => return Some(window),
            }
        }
    }
}

impl Drop for WindowStream {
    fn drop(&mut self) {
        self.cancel();
    }
}

//-----------------------------------------------------------------------------

/// Window generation.
impl GrootGraph {
    /// Returns a lazy stream of windows with unique signatures over all paths of the graph.
    ///
    /// Paths are processed in identifier order and windows in increasing offset order.
    /// Signatures are computed with [`signature`].
    /// A window is dropped if it has no valid k-mers or if its signature has already been emitted in the scope given by `params.uniqueness`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidWindowConfig`] if the parameters are invalid.
    /// In that case, no thread is started.
    ///
    /// # Examples
    ///
    /// ```
    /// use groot_graph::{BuildParams, GrootGraph, SequenceGraph, WindowParams};
    ///
    /// let mut description = SequenceGraph::new();
    /// description.add_segment(1, b"GATTACACATTAGACCAGATTACA");
    /// description.add_path(b"example", &[1]);
    /// let graph = GrootGraph::new(&description, &BuildParams::default()).unwrap();
    ///
    /// let params = WindowParams::new(10, 4, 8);
    /// for window in graph.window_graph(&params).unwrap() {
    ///     assert_eq!(window.len(), 10);
    ///     assert!(window.signature.len() <= 8);
    /// }
    ///
    /// // K-mers longer than the window are rejected.
    /// assert!(graph.window_graph(&WindowParams::new(10, 11, 8)).is_err());
    /// ```
    pub fn window_graph(&self, params: &WindowParams) -> Result<WindowStream> {
        params.validate()?;

        let mut tracks: Vec<PathTrack> = Vec::with_capacity(self.path_count());
        for path_id in self.paths().keys() {
            tracks.push(PathTrack::new(self, *path_id)?);
        }

        let (sender, receiver) = mpsc::sync_channel(params.channel_capacity);
        let stop = CancellationToken::new();
        let producer = {
            let params = params.clone();
            let stop = stop.clone();
            thread::spawn(move || produce_windows(tracks, params, stop, sender))
        };

        let registry = match &params.uniqueness {
            Uniqueness::PerGraph => None,
            Uniqueness::Shared(registry) => Some(registry.clone()),
        };
        Ok(WindowStream { receiver: Some(receiver), stop, producer: Some(producer), registry })
    }
}

fn produce_windows(tracks: Vec<PathTrack>, params: WindowParams, stop: CancellationToken, sender: SyncSender<Window>) {
    let stopped = || stop.is_cancelled() || params.cancel.as_ref().map_or(false, |token| token.is_cancelled());
    let mut seen: HashSet<Vec<u64>> = HashSet::new();
    let (mut emitted, mut duplicates) = (0, 0);

    for track in tracks.iter() {
        for (start, end) in window_bounds(track.sequence.len(), &params) {
            if stopped() {
                debug!("Window generation cancelled after {} windows", emitted);
                return;
            }
            let signature = signature(&track.sequence[start..end], params.k_size, params.sig_size);
            if signature.is_empty() {
                continue;
            }
            let is_new = match &params.uniqueness {
                Uniqueness::PerGraph => {
                    if seen.contains(&signature) { false } else { seen.insert(signature.clone()) }
                },
                // The consumer registers the signature when it receives the window.
                Uniqueness::Shared(registry) => {
                    if registry.contains(&signature) || seen.contains(&signature) { false } else { seen.insert(signature.clone()) }
                },
            };
            if !is_new {
                duplicates += 1;
                continue;
            }
            let (node_id, node_offset) = track.locate(start);
            let window = Window { path_id: track.path_id, start, end, node_id, node_offset, signature };
            if sender.send(window).is_err() {
                // The consumer is gone.
                return;
            }
            emitted += 1;
        }
    }

    debug!("Emitted {} windows, dropped {} duplicate signatures", emitted, duplicates);
}

//-----------------------------------------------------------------------------

// Signature computation.

const fn generate_encoding() -> [u8; 256] {
    let mut result = [4; 256];
    result[b'a' as usize] = 0; result[b'A' as usize] = 0;
    result[b'c' as usize] = 1; result[b'C' as usize] = 1;
    result[b'g' as usize] = 2; result[b'G' as usize] = 2;
    result[b't' as usize] = 3; result[b'T' as usize] = 3;
    result
}

const ENCODE: [u8; 256] = generate_encoding();

// Finalizer from MurmurHash3.
#[inline]
fn mix64(mut key: u64) -> u64 {
    key ^= key >> 33;
    key = key.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    key ^= key >> 33;
    key = key.wrapping_mul(0xC4CE_B9FE_1A85_EC53);
    key ^= key >> 33;
    key
}

/// Returns the hash values of all k-mers of the sequence in sequence order.
///
/// K-mers are packed with two bits per base, with `acgtACGT` as the alphabet.
/// K-mers containing any other character are skipped.
/// `k` must be between 1 and [`WindowParams::MAX_K`].
pub fn kmer_hashes(sequence: &[u8], k: usize) -> Vec<u64> {
    if k == 0 || k > WindowParams::MAX_K || sequence.len() < k {
        return Vec::new();
    }
    let mask: u64 = if k == WindowParams::MAX_K { u64::MAX } else { (1u64 << (2 * k)) - 1 };

    let mut result: Vec<u64> = Vec::with_capacity(sequence.len() + 1 - k);
    let mut packed: u64 = 0;
    let mut valid = 0;
    for base in sequence {
        let code = ENCODE[*base as usize];
        if code > 3 {
            valid = 0;
            continue;
        }
        packed = ((packed << 2) | code as u64) & mask;
        valid += 1;
        if valid >= k {
            result.push(mix64(packed));
        }
    }

    result
}

/// Returns the MinHash signature of the sequence.
///
/// The signature consists of the `sig_size` smallest distinct k-mer hash values in ascending order.
/// It is shorter if the sequence has fewer distinct k-mers.
///
/// # Examples
///
/// ```
/// use groot_graph::window;
///
/// let sig = window::signature(b"GATTACA", 3, 4);
/// assert_eq!(sig.len(), 4);
/// assert!(sig.windows(2).all(|pair| pair[0] < pair[1]));
///
/// // Only two distinct 3-mers: ACA and CAC.
/// assert_eq!(window::signature(b"ACACA", 3, 4).len(), 2);
/// ```
pub fn signature(sequence: &[u8], k: usize, sig_size: usize) -> Vec<u64> {
    let mut hashes = kmer_hashes(sequence, k);
    hashes.sort_unstable();
    hashes.dedup();
    hashes.truncate(sig_size);
    hashes
}

//-----------------------------------------------------------------------------
