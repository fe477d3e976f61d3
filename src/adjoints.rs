use crate::Index;

/// Gradient storage addressed by identifier.
///
/// Reading past the end yields `0.0`, writing past the end grows the
/// vector first, so identifiers handed out after the last resize are
/// always usable.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AdjointVector {
    values: Vec<f64>,
}

impl AdjointVector {
    pub fn new() -> AdjointVector {
        AdjointVector::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, index: Index) -> f64 {
        self.values.get(index as usize).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn get_mut(&mut self, index: Index) -> &mut f64 {
        let slot = index as usize;
        if slot >= self.values.len() {
            self.values.resize(slot + 1, 0.0);
        }
        &mut self.values[slot]
    }

    #[inline]
    pub fn set(&mut self, index: Index, value: f64) {
        *self.get_mut(index) = value;
    }

    #[inline]
    pub fn add(&mut self, index: Index, value: f64) {
        *self.get_mut(index) += value;
    }

    /// Grows to `len` slots. Never shrinks.
    pub fn resize(&mut self, len: usize) {
        if len > self.values.len() {
            self.values.resize(len, 0.0);
        }
    }

    /// Zeroes every slot, keeping the allocation.
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|value| *value = 0.0);
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
