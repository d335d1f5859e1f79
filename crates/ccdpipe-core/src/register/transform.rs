use nalgebra::{DMatrix, DVector};

/// Rotation, uniform scale and translation mapping source coordinates onto
/// reference coordinates:
///
/// ```text
/// x' = a*x - b*y + tx
/// y' = b*x + a*y + ty
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityTransform {
    pub a: f64,
    pub b: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for SimilarityTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl SimilarityTransform {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Least-squares fit from `(source, reference)` point pairs.
    /// Needs at least two distinct pairs.
    pub fn fit(pairs: &[((f64, f64), (f64, f64))]) -> Option<Self> {
        if pairs.len() < 2 {
            return None;
        }

        let n = pairs.len();
        let mut design = DMatrix::<f64>::zeros(2 * n, 4);
        let mut target = DVector::<f64>::zeros(2 * n);
        for (i, &((x, y), (xr, yr))) in pairs.iter().enumerate() {
            let r = 2 * i;
            design[(r, 0)] = x;
            design[(r, 1)] = -y;
            design[(r, 2)] = 1.0;
            target[r] = xr;

            design[(r + 1, 0)] = y;
            design[(r + 1, 1)] = x;
            design[(r + 1, 3)] = 1.0;
            target[r + 1] = yr;
        }

        let svd = design.svd(true, true);
        let solution = svd.solve(&target, 1e-12).ok()?;
        let t = Self {
            a: solution[0],
            b: solution[1],
            tx: solution[2],
            ty: solution[3],
        };
        (t.scale() > 1e-9 && t.a.is_finite() && t.b.is_finite()).then_some(t)
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    /// Map a reference coordinate back onto the source grid.
    pub fn inverse_apply(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.a * self.a + self.b * self.b;
        let dx = x - self.tx;
        let dy = y - self.ty;
        (
            (self.a * dx + self.b * dy) / det,
            (-self.b * dx + self.a * dy) / det,
        )
    }

    pub fn scale(&self) -> f64 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Rotation in degrees.
    pub fn rotation(&self) -> f64 {
        self.b.atan2(self.a).to_degrees()
    }
}
