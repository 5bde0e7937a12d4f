pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

/// Text → fixed-length vector. Ingestion and querying must use the same
/// embedder; vectors from different models are not comparable.
pub trait Embedder {
    fn dimensions(&self) -> usize;

    fn model_name(&self) -> String;

    fn embed(&self, text: &str) -> Vec<f32>;

    /// Order-preserving: the i-th vector belongs to the i-th text.
    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Hashed character-trigram bag, L2-normalized.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = 1469598103934665603u64;
    let mut buffer = [0u8; 4];
    for ch in chars {
        for byte in ch.encode_utf8(&mut buffer).bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
    }
    hash
}

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    fn model_name(&self) -> String {
        format!("char-trigram-{}", self.dimensions())
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions()];
        let chars = text.to_lowercase().chars().collect::<Vec<_>>();

        for window in chars.windows(3) {
            let bucket = (fnv1a(window) % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}
