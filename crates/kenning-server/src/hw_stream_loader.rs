//! CNN accelerator weights/biases word-stream loader.
//!
//! Grounded on `ai8x_loaders.c`'s `buf_save_one_cnn`/`buf_reset_cnn`: the
//! stream is a sequence of little-endian 32-bit words forming
//! `(addr, length, words…)` blocks, first for weights then for biases, each
//! section terminated by an `addr == 0` sentinel word.

use kenning_core::{Loader, LoaderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    WeightsStart,
    WeightsLength,
    Weights,
    BiasesStart,
    BiasesLength,
    Biases,
    End,
}

/// One streamed `(addr, words)` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordBlock {
    /// The destination address/register tag carried by the stream.
    pub addr: u32,
    /// The words belonging to this block.
    pub words: Vec<u32>,
}

/// Decodes the `(addr, length, words…)*, 0` word stream into separate
/// weight and bias block lists, for a hardware accelerator backend to then
/// write into its own registers.
pub struct HardwareStreamLoader {
    state: LoadState,
    expected_len: u32,
    weights: Vec<WordBlock>,
    biases: Vec<WordBlock>,
    total_words: usize,
}

impl Default for HardwareStreamLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareStreamLoader {
    /// A loader at its initial `WEIGHTS_START` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: LoadState::WeightsStart,
            expected_len: 0,
            weights: Vec::new(),
            biases: Vec::new(),
            total_words: 0,
        }
    }

    /// The weight blocks accumulated so far.
    #[must_use]
    pub fn weights(&self) -> &[WordBlock] {
        &self.weights
    }

    /// The bias blocks accumulated so far.
    #[must_use]
    pub fn biases(&self) -> &[WordBlock] {
        &self.biases
    }

    /// Whether the terminating sentinel has been seen.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == LoadState::End
    }

    fn save_word(&mut self, word: u32) {
        match self.state {
            LoadState::WeightsStart => {
                if word == 0 {
                    self.state = LoadState::BiasesStart;
                } else {
                    self.weights.push(WordBlock { addr: word, words: Vec::new() });
                    self.state = LoadState::WeightsLength;
                }
            },
            LoadState::WeightsLength => {
                self.expected_len = word;
                self.state = LoadState::Weights;
            },
            LoadState::Weights => {
                if let Some(block) = self.weights.last_mut() {
                    block.words.push(word);
                    if block.words.len() as u32 == self.expected_len {
                        self.state = LoadState::WeightsStart;
                    }
                }
            },
            LoadState::BiasesStart => {
                if word == 0 {
                    self.state = LoadState::End;
                } else {
                    self.biases.push(WordBlock { addr: word, words: Vec::new() });
                    self.state = LoadState::BiasesLength;
                }
            },
            LoadState::BiasesLength => {
                self.expected_len = word;
                self.state = LoadState::Biases;
            },
            LoadState::Biases => {
                if let Some(block) = self.biases.last_mut() {
                    block.words.push(word);
                    if block.words.len() as u32 == self.expected_len {
                        self.state = LoadState::BiasesStart;
                    }
                }
            },
            LoadState::End => {},
        }
    }
}

impl Loader for HardwareStreamLoader {
    fn reset(&mut self, _expected_size: usize) -> Result<(), LoaderError> {
        self.state = LoadState::WeightsStart;
        self.expected_len = 0;
        self.weights.clear();
        self.biases.clear();
        self.total_words = 0;
        Ok(())
    }

    fn save(&mut self, chunk: &[u8]) -> Result<(), LoaderError> {
        if chunk.len() % 4 != 0 {
            return Err(LoaderError::InvalidInput("hardware stream loader requires 4-byte-aligned chunks"));
        }
        for word_bytes in chunk.chunks_exact(4) {
            let word = u32::from_le_bytes([word_bytes[0], word_bytes[1], word_bytes[2], word_bytes[3]]);
            self.save_word(word);
            self.total_words += 1;
        }
        Ok(())
    }

    fn written(&self) -> usize {
        self.total_words * 4
    }

    fn max_size(&self) -> usize {
        usize::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_one_weight_block_and_terminates() {
        let mut loader = HardwareStreamLoader::new();
        loader.reset(0).unwrap();
        let stream = words_to_bytes(&[0x1000, 2, 7, 8, 0, 0]);
        loader.save(&stream).unwrap();

        assert!(loader.is_done());
        assert_eq!(loader.weights(), &[WordBlock { addr: 0x1000, words: vec![7, 8] }]);
        assert!(loader.biases().is_empty());
    }

    #[test]
    fn decodes_weights_then_biases() {
        let mut loader = HardwareStreamLoader::new();
        loader.reset(0).unwrap();
        let stream = words_to_bytes(&[0x10, 1, 42, 0, 0x20, 1, 99, 0]);
        loader.save(&stream).unwrap();

        assert!(loader.is_done());
        assert_eq!(loader.weights(), &[WordBlock { addr: 0x10, words: vec![42] }]);
        assert_eq!(loader.biases(), &[WordBlock { addr: 0x20, words: vec![99] }]);
    }

    #[test]
    fn unaligned_chunk_is_rejected() {
        let mut loader = HardwareStreamLoader::new();
        let err = loader.save(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidInput(_)));
    }

    #[test]
    fn reset_clears_accumulated_blocks() {
        let mut loader = HardwareStreamLoader::new();
        loader.save(&words_to_bytes(&[0x10, 1, 42, 0, 0])).unwrap();
        assert!(!loader.weights().is_empty());

        loader.reset(0).unwrap();
        assert!(loader.weights().is_empty());
        assert!(!loader.is_done());
    }

    #[test]
    fn split_across_multiple_save_calls_still_decodes() {
        let mut loader = HardwareStreamLoader::new();
        let stream = words_to_bytes(&[0x10, 2, 1, 2, 0, 0]);
        for chunk in stream.chunks(4) {
            loader.save(chunk).unwrap();
        }
        assert!(loader.is_done());
        assert_eq!(loader.weights(), &[WordBlock { addr: 0x10, words: vec![1, 2] }]);
    }
}
