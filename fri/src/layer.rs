use std::cell::RefCell;
use std::rc::Rc;

use math::{FieldElement, StarkField};

use crate::bases::FftBases;
use crate::folder::compute_next_fri_layer;
use crate::lde::{FftPrecompute, LdeManager};
use crate::parameters::FriProverConfig;

// FRI LAYER INTERFACE
// ================================================================================================

/// A FRI layer shared between the committed-layer that decommits it and the proxy that folds
/// it into the next layer.
pub type SharedFriLayer<B> = Rc<RefCell<dyn FriLayer<B>>>;

/// Scratch space used while producing layer chunks. Chunk production may mutate the scratch
/// (the out-of-memory layer keeps its twiddle table here), so a storage must not be shared
/// between two producers.
pub enum LayerStorage<B: StarkField> {
    None,
    OutOfMemory { accumulation: Vec<B>, precompute: Option<FftPrecompute<B>> },
    Proxy { prev_chunk: Vec<B>, prev_storage: Box<LayerStorage<B>> },
}

/// One (virtual) evaluation in the FRI layer sequence.
///
/// The evaluation is queried in chunks whose size is an implementation matter of the concrete
/// layer kind; a chunk request may trigger anything from a memcpy to an FFT.
pub trait FriLayer<B: StarkField> {
    /// The size of the whole layer, regardless of representation.
    fn layer_size(&self) -> u64;

    /// The natural chunk size of this layer; divides [Self::layer_size].
    fn chunk_size(&self) -> u64;

    fn domain(&self) -> &FftBases<B>;

    /// Creates a scratch storage for use with [Self::get_chunk].
    fn make_storage(&self) -> LayerStorage<B>;

    /// Writes `requested_size` consecutive values starting at `chunk_index * requested_size`
    /// into `output`. `requested_size` must not exceed [Self::chunk_size].
    fn get_chunk(
        &mut self,
        storage: &mut LayerStorage<B>,
        output: &mut [B],
        requested_size: u64,
        chunk_index: u64,
    );

    /// Evaluates the layer at specific indices.
    fn eval_at_points(&mut self, required_indices: &[u64]) -> Vec<B>;

    /// Concatenates every chunk into the full evaluation.
    fn get_all_evaluation(&mut self) -> Vec<B> {
        let chunk_size = self.chunk_size();
        let layer_size = self.layer_size();
        // Every position is written by exactly one chunk below.
        let mut all_evaluation = unsafe { utils::uninit_vector(layer_size as usize) };
        let mut storage = self.make_storage();
        for chunk_index in 0..layer_size / chunk_size {
            let start = (chunk_index * chunk_size) as usize;
            self.get_chunk(
                &mut storage,
                &mut all_evaluation[start..start + chunk_size as usize],
                chunk_size,
                chunk_index,
            );
        }
        all_evaluation
    }
}

// IN-MEMORY LAYER
// ================================================================================================

/// A layer that keeps its entire evaluation in memory; its chunk is the whole layer.
pub struct FriLayerInMemory<B: StarkField> {
    domain: FftBases<B>,
    evaluation: Vec<B>,
}

impl<B: StarkField> FriLayerInMemory<B> {
    pub fn new(evaluation: Vec<B>, domain: FftBases<B>) -> Self {
        assert!(
            evaluation.len() as u64 == domain.layer_size(0),
            "evaluation size does not match the domain size"
        );
        FriLayerInMemory { domain, evaluation }
    }

    /// Materializes the full evaluation of another layer.
    pub fn from_layer(prev_layer: &mut dyn FriLayer<B>) -> Self {
        let domain = prev_layer.domain().clone();
        let evaluation = prev_layer.get_all_evaluation();
        Self::new(evaluation, domain)
    }
}

impl<B: StarkField> FriLayer<B> for FriLayerInMemory<B> {
    fn layer_size(&self) -> u64 {
        self.evaluation.len() as u64
    }

    fn chunk_size(&self) -> u64 {
        self.evaluation.len() as u64
    }

    fn domain(&self) -> &FftBases<B> {
        &self.domain
    }

    fn make_storage(&self) -> LayerStorage<B> {
        LayerStorage::None
    }

    fn get_chunk(
        &mut self,
        _storage: &mut LayerStorage<B>,
        output: &mut [B],
        requested_size: u64,
        chunk_index: u64,
    ) {
        let start = (chunk_index * requested_size) as usize;
        output.copy_from_slice(&self.evaluation[start..start + requested_size as usize]);
    }

    fn eval_at_points(&mut self, required_indices: &[u64]) -> Vec<B> {
        required_indices.iter().map(|&i| self.evaluation[i as usize]).collect()
    }
}

// OUT-OF-MEMORY LAYER
// ================================================================================================

/// A layer that keeps only its first coset in memory and regenerates every other coset from a
/// low-degree extension.
///
/// The LDE is initialized lazily, consuming the stored coset; from that point on chunk 0 is
/// regenerated like any other chunk.
pub struct FriLayerOutOfMemory<B: StarkField> {
    domain: FftBases<B>,
    coset_size: u64,
    coset_bases: FftBases<B>,
    coset_offsets: Vec<B>,
    evaluation: Vec<B>,
    lde: Option<LdeManager<B>>,
    is_evaluation_moved: bool,
}

impl<B: StarkField> FriLayerOutOfMemory<B> {
    /// Wraps an evaluation prefix (the first coset) of a layer over `domain`.
    pub fn new(evaluation: Vec<B>, domain: FftBases<B>) -> Self {
        let coset_size = evaluation.len() as u64;
        assert!(coset_size <= domain.layer_size(0), "the coset must not exceed the domain");
        let (coset_bases, coset_offsets) = domain.split_to_cosets(0, coset_size);
        FriLayerOutOfMemory {
            domain,
            coset_size,
            coset_bases,
            coset_offsets,
            evaluation,
            lde: None,
            is_evaluation_moved: false,
        }
    }

    /// Materializes the first `coset_size` values of another layer.
    pub fn from_layer(prev_layer: &mut dyn FriLayer<B>, coset_size: u64) -> Self {
        let domain = prev_layer.domain().clone();
        let mut evaluation = vec![B::ZERO; coset_size as usize];
        let mut prev_storage = prev_layer.make_storage();
        prev_layer.get_chunk(&mut prev_storage, &mut evaluation, coset_size, 0);
        Self::new(evaluation, domain)
    }

    /// Builds the LDE from the stored coset. Once this runs, the stored evaluation is gone and
    /// chunk 0 must be regenerated like the others.
    fn init_lde_manager(&mut self) {
        if self.lde.is_some() {
            return;
        }
        let first_coset_bases = self.coset_bases.with_offset(self.coset_offsets[0]);
        let evaluation = core::mem::take(&mut self.evaluation);
        self.lde = Some(LdeManager::from_evaluation(first_coset_bases, evaluation));
        self.is_evaluation_moved = true;
    }
}

impl<B: StarkField> FriLayer<B> for FriLayerOutOfMemory<B> {
    fn layer_size(&self) -> u64 {
        self.domain.layer_size(0)
    }

    fn chunk_size(&self) -> u64 {
        self.coset_size
    }

    fn domain(&self) -> &FftBases<B> {
        &self.domain
    }

    fn make_storage(&self) -> LayerStorage<B> {
        LayerStorage::OutOfMemory { accumulation: vec![], precompute: None }
    }

    fn get_chunk(
        &mut self,
        storage: &mut LayerStorage<B>,
        output: &mut [B],
        requested_size: u64,
        chunk_index: u64,
    ) {
        assert!(
            requested_size <= self.coset_size && chunk_index < self.layer_size() / self.coset_size,
            "bad chunk parameters for an out-of-memory layer"
        );

        if chunk_index == 0 && !self.is_evaluation_moved {
            output.copy_from_slice(&self.evaluation[..requested_size as usize]);
            return;
        }

        self.init_lde_manager();
        let LayerStorage::OutOfMemory { accumulation, precompute } = storage else {
            panic!("no storage for an out-of-memory layer");
        };
        let lde = self.lde.as_ref().unwrap();
        if precompute.is_none() {
            *precompute = Some(lde.fft_precompute());
        }
        let precompute = precompute.as_ref().unwrap();

        if requested_size == self.coset_size {
            lde.eval_on_coset(self.coset_offsets[chunk_index as usize], output, precompute);
        } else {
            accumulation.resize(self.coset_size as usize, B::ZERO);
            lde.eval_on_coset(self.coset_offsets[chunk_index as usize], accumulation, precompute);
            output.copy_from_slice(&accumulation[..requested_size as usize]);
        }
    }

    fn eval_at_points(&mut self, required_indices: &[u64]) -> Vec<B> {
        let points: Vec<B> =
            required_indices.iter().map(|&i| self.domain.element_at(0, i)).collect();
        self.init_lde_manager();
        self.lde.as_ref().unwrap().eval_at_points(&points)
    }
}

// PROXY LAYER
// ================================================================================================

/// A layer that owns no data: each chunk is produced by pulling the two corresponding chunks
/// of the previous layer and folding them with the evaluation point.
///
/// The proxy is the only layer kind that folds the domain, so at least one proxy sits between
/// every two materialized layers.
pub struct FriLayerProxy<B: StarkField> {
    domain: FftBases<B>,
    prev_layer: SharedFriLayer<B>,
    eval_point: B,
    chunk_size: u64,
    coset_bases: FftBases<B>,
    coset_offsets: Vec<B>,
}

impl<B: StarkField> FriLayerProxy<B> {
    pub fn new(
        prev_layer: SharedFriLayer<B>,
        eval_point: B,
        fri_prover_config: &FriProverConfig,
    ) -> Self {
        let (domain, chunk_size, coset_bases, coset_offsets) = {
            let prev = prev_layer.borrow();
            let domain = prev.domain().from_layer(1);
            let chunk_size = Self::calculate_chunk_size(
                prev.layer_size(),
                prev.chunk_size(),
                fri_prover_config,
            );
            let (coset_bases, coset_offsets) =
                prev.domain().split_to_cosets(0, chunk_size * 2);
            (domain, chunk_size, coset_bases, coset_offsets)
        };
        FriLayerProxy { domain, prev_layer, eval_point, chunk_size, coset_bases, coset_offsets }
    }

    /// The chunk size is half the previous layer's, unless the previous layer is both large and
    /// not yet divided into chunks, in which case it gets divided here.
    fn calculate_chunk_size(
        prev_layer_size: u64,
        prev_layer_chunk_size: u64,
        config: &FriProverConfig,
    ) -> u64 {
        let not_split = prev_layer_chunk_size == prev_layer_size;
        if not_split && prev_layer_size > config.max_non_chunked_layer_size {
            config
                .max_non_chunked_layer_size
                .max(prev_layer_size / config.n_chunks_between_layers)
        } else {
            prev_layer_chunk_size / 2
        }
    }
}

impl<B: StarkField> FriLayer<B> for FriLayerProxy<B> {
    fn layer_size(&self) -> u64 {
        self.domain.layer_size(0)
    }

    fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    fn domain(&self) -> &FftBases<B> {
        &self.domain
    }

    fn make_storage(&self) -> LayerStorage<B> {
        LayerStorage::Proxy {
            prev_chunk: vec![B::ZERO; 2 * self.chunk_size as usize],
            prev_storage: Box::new(self.prev_layer.borrow().make_storage()),
        }
    }

    fn get_chunk(
        &mut self,
        storage: &mut LayerStorage<B>,
        output: &mut [B],
        requested_size: u64,
        chunk_index: u64,
    ) {
        assert!(requested_size == self.chunk_size, "a proxy serves only whole chunks");
        let LayerStorage::Proxy { prev_chunk, prev_storage } = storage else {
            panic!("no storage for a proxy layer");
        };

        let chunk_domain = self.coset_bases.with_offset(self.coset_offsets[chunk_index as usize]);
        self.prev_layer.borrow_mut().get_chunk(
            prev_storage,
            prev_chunk,
            requested_size * 2,
            chunk_index,
        );
        compute_next_fri_layer(&chunk_domain, prev_chunk, self.eval_point, output);
    }

    fn eval_at_points(&mut self, _required_indices: &[u64]) -> Vec<B> {
        unreachable!("a proxy layer is never queried at points")
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use math::fields::f128::BaseElement;
    use rand_utils::{rand_value, rand_vector};

    use crate::test_utils::random_polynomial_evaluation;

    const LOG2_EVAL_DOMAIN: usize = 10;
    const FIRST_LAYER_DEGREE_BOUND: usize = 320;

    struct LayerChain {
        layer_0_out: SharedFriLayer<BaseElement>,
        layer_1_proxy: SharedFriLayer<BaseElement>,
        witness_prefix: Vec<BaseElement>,
        eval_point: BaseElement,
        bases: FftBases<BaseElement>,
    }

    fn config() -> FriProverConfig {
        FriProverConfig::default()
    }

    fn build_chain() -> LayerChain {
        let bases = FftBases::new(LOG2_EVAL_DOMAIN, BaseElement::ONE);
        let full_evaluation = random_polynomial_evaluation(FIRST_LAYER_DEGREE_BOUND, &bases);
        let prefix_size = (1 << LOG2_EVAL_DOMAIN) / 2;
        let witness_prefix = full_evaluation[..prefix_size].to_vec();
        let eval_point: BaseElement = rand_value();

        let layer_0_out: SharedFriLayer<BaseElement> = Rc::new(RefCell::new(
            FriLayerOutOfMemory::new(witness_prefix.clone(), bases.clone()),
        ));
        let layer_1_proxy: SharedFriLayer<BaseElement> = Rc::new(RefCell::new(
            FriLayerProxy::new(layer_0_out.clone(), eval_point, &config()),
        ));
        LayerChain { layer_0_out, layer_1_proxy, witness_prefix, eval_point, bases }
    }

    #[test]
    fn layer_and_chunk_sizes() {
        let chain = build_chain();
        let layer_2_out: SharedFriLayer<BaseElement> = Rc::new(RefCell::new(
            FriLayerOutOfMemory::from_layer(&mut *chain.layer_1_proxy.borrow_mut(), 256),
        ));
        let layer_3_proxy: SharedFriLayer<BaseElement> = Rc::new(RefCell::new(
            FriLayerProxy::new(layer_2_out.clone(), chain.eval_point, &config()),
        ));
        let mut layer_4_in = FriLayerInMemory::from_layer(&mut *layer_3_proxy.borrow_mut());

        assert_eq!(chain.layer_0_out.borrow().layer_size(), 1024);
        assert_eq!(chain.layer_1_proxy.borrow().layer_size(), 512);
        assert_eq!(layer_2_out.borrow().layer_size(), 512);
        assert_eq!(layer_3_proxy.borrow().layer_size(), 256);
        assert_eq!(layer_4_in.layer_size(), 256);

        assert_eq!(chain.layer_0_out.borrow().chunk_size(), 512);
        assert_eq!(chain.layer_1_proxy.borrow().chunk_size(), 256);
        assert_eq!(layer_2_out.borrow().chunk_size(), 256);
        assert_eq!(layer_3_proxy.borrow().chunk_size(), 128);
        assert_eq!(layer_4_in.chunk_size(), 256);

        // The in-memory layer serves its full evaluation as one chunk.
        let all = layer_4_in.get_all_evaluation();
        assert_eq!(all.len(), 256);
    }

    #[test]
    fn out_of_memory_first_chunk_is_the_stored_coset() {
        let chain = build_chain();
        let layer = &chain.layer_0_out;

        let chunk_size = layer.borrow().chunk_size();
        assert_eq!(chunk_size as usize, chain.witness_prefix.len());

        let mut storage = layer.borrow().make_storage();
        let mut chunk = vec![BaseElement::ZERO; chunk_size as usize];
        layer.borrow_mut().get_chunk(&mut storage, &mut chunk, chunk_size, 0);
        assert_eq!(chunk, chain.witness_prefix);
    }

    #[test]
    fn out_of_memory_regenerates_the_full_evaluation() {
        let chain = build_chain();
        // Reconstructing from the stored half-domain coset must reproduce the polynomial's
        // evaluation over the whole domain.
        let full = chain.layer_0_out.borrow_mut().get_all_evaluation();
        let expected = {
            let lde = LdeManager::from_evaluation(
                chain.bases.split_to_cosets(0, 512).0.with_offset(chain.bases.offset(0)),
                chain.witness_prefix.clone(),
            );
            let points: Vec<BaseElement> =
                (512..1024).map(|i| chain.bases.element_at(0, i)).collect();
            lde.eval_at_points(&points)
        };
        assert_eq!(&full[..512], &chain.witness_prefix[..]);
        assert_eq!(&full[512..], &expected[..]);
    }

    #[test]
    fn proxy_layer_folds_the_previous_layer() {
        let chain = build_chain();
        let prev_layer_eval = chain.layer_0_out.borrow_mut().get_all_evaluation();

        let layer_eval = chain.layer_1_proxy.borrow_mut().get_all_evaluation();
        let mut folded = vec![BaseElement::ZERO; prev_layer_eval.len() / 2];
        compute_next_fri_layer(&chain.bases, &prev_layer_eval, chain.eval_point, &mut folded);
        assert_eq!(layer_eval, folded);
    }

    #[test]
    fn out_of_memory_over_proxy_matches_full_fold() {
        let chain = build_chain();
        let prev_layer_eval = chain.layer_0_out.borrow_mut().get_all_evaluation();
        let mut layer_2_out =
            FriLayerOutOfMemory::from_layer(&mut *chain.layer_1_proxy.borrow_mut(), 256);

        let mut folded = vec![BaseElement::ZERO; prev_layer_eval.len() / 2];
        compute_next_fri_layer(&chain.bases, &prev_layer_eval, chain.eval_point, &mut folded);

        let layer_eval = layer_2_out.get_all_evaluation();
        assert_eq!(layer_eval, folded);
    }

    #[test]
    fn in_memory_over_proxy_matches_full_fold() {
        let chain = build_chain();
        let prev_layer_eval = chain.layer_0_out.borrow_mut().get_all_evaluation();
        let mut layer_2_in = FriLayerInMemory::from_layer(&mut *chain.layer_1_proxy.borrow_mut());

        let mut folded = vec![BaseElement::ZERO; prev_layer_eval.len() / 2];
        compute_next_fri_layer(&chain.bases, &prev_layer_eval, chain.eval_point, &mut folded);

        let layer_eval = layer_2_in.get_all_evaluation();
        assert_eq!(layer_eval, folded);
        assert_eq!(layer_2_in.chunk_size(), layer_2_in.layer_size());
    }

    #[test]
    fn eval_at_points_matches_the_evaluation() {
        let chain = build_chain();
        let mut layer_2_in = FriLayerInMemory::from_layer(&mut *chain.layer_1_proxy.borrow_mut());
        let layer_eval = layer_2_in.get_all_evaluation();

        let evaluation = layer_2_in.eval_at_points(&[42]);
        assert_eq!(evaluation[0], layer_eval[42]);

        // The out-of-memory path answers point queries through its LDE.
        let mut layer_0 = FriLayerOutOfMemory::new(chain.witness_prefix.clone(), chain.bases.clone());
        let full = layer_0.get_all_evaluation();
        let values = layer_0.eval_at_points(&[3, 700]);
        assert_eq!(values, vec![full[3], full[700]]);
    }

    #[test]
    fn random_in_memory_layer_round_trips() {
        let bases = FftBases::new(5, BaseElement::GENERATOR);
        let evaluation: Vec<BaseElement> = rand_vector(32);
        let mut layer = FriLayerInMemory::new(evaluation.clone(), bases);
        assert_eq!(layer.get_all_evaluation(), evaluation);
    }
}
