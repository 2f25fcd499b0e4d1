//! Axis-aligned box geometry in embedding space.
//!
//! A batch of boxes is a pair of `(batch, dim)` tensors: centers and
//! non-negative half-extents (offsets). Boxes are ephemeral: they are
//! built from embedding lookups inside a forward pass and never persisted.
//!
//! Intersection deliberately does not clamp or signal emptiness. It hands
//! back the raw per-axis `lower`/`upper` bounds so that callers can turn
//! `lower > upper` into their own penalty term.

use candle_core::Tensor;

use crate::error::Result;

/// A batch of axis-aligned hyperrectangles.
#[derive(Debug, Clone)]
pub struct Boxes {
    centers: Tensor,
    offsets: Tensor,
}

impl Boxes {
    /// Create boxes from explicit center and offset tensors of equal shape.
    pub fn new(centers: Tensor, offsets: Tensor) -> Self {
        Self { centers, offsets }
    }

    /// Split a `(batch, 2*dim)` embedding into boxes: the first `dim`
    /// columns are centers, the last `dim` are raw half-widths whose
    /// absolute value becomes the offset. Offsets are therefore always
    /// non-negative without constraining the underlying parameters.
    pub fn from_embedding(embedding: &Tensor, dim: usize) -> Result<Self> {
        let centers = embedding.narrow(1, 0, dim)?;
        let offsets = embedding.narrow(1, dim, dim)?.abs()?;
        Ok(Self { centers, offsets })
    }

    /// Box centers, shape `(batch, dim)`.
    pub fn centers(&self) -> &Tensor {
        &self.centers
    }

    /// Box half-extents, shape `(batch, dim)`.
    pub fn offsets(&self) -> &Tensor {
        &self.offsets
    }

    /// Per-axis lower corners: `center - offset`.
    pub fn lower(&self) -> Result<Tensor> {
        Ok((&self.centers - &self.offsets)?)
    }

    /// Per-axis upper corners: `center + offset`.
    pub fn upper(&self) -> Result<Tensor> {
        Ok((&self.centers + &self.offsets)?)
    }

    /// Shift centers by `bump`, leaving offsets untouched.
    pub fn translate(&self, bump: &Tensor) -> Result<Boxes> {
        Ok(Boxes {
            centers: self.centers.broadcast_add(bump)?,
            offsets: self.offsets.clone(),
        })
    }

    /// Geometric intersection along every axis independently.
    ///
    /// Returns the intersection box together with the raw per-axis
    /// `(lower, upper)` bounds. When the boxes do not overlap on some
    /// axis the returned box is degenerate (`lower > upper`, negative
    /// offset); detecting and penalizing that is the caller's job.
    pub fn intersect(&self, other: &Boxes) -> Result<(Boxes, Tensor, Tensor)> {
        let lower = self.lower()?.maximum(&other.lower()?)?;
        let upper = self.upper()?.minimum(&other.upper()?)?;
        let centers = ((&lower + &upper)? * 0.5)?;
        let offsets = ((&upper - &lower)? * 0.5)?;
        Ok((Boxes { centers, offsets }, lower, upper))
    }
}
