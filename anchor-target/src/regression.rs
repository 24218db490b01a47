//! Box regression targets relative to anchors.

use crate::common::*;

/// The offsets turning an anchor into its matched box.
///
/// Positions are normalized by the anchor size and sizes are log-scaled:
///
/// ```text
/// dy = (y - y_a) / h_a
/// dx = (x - x_a) / w_a
/// dh = ln(h / h_a)
/// dw = ln(w / w_a)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxDelta {
    pub dy: f64,
    pub dx: f64,
    pub dh: f64,
    pub dw: f64,
}

impl BoxDelta {
    /// Computes the offsets. Both boxes must have positive height and width.
    pub fn encode(anchor: &TLHW<f64>, truth: &TLHW<f64>) -> Self {
        let [y_a, x_a, h_a, w_a] = anchor.tlhw();
        let [y, x, h, w] = truth.tlhw();
        debug_assert!(h_a > 0.0 && w_a > 0.0 && h > 0.0 && w > 0.0);

        Self {
            dy: (y - y_a) / h_a,
            dx: (x - x_a) / w_a,
            dh: (h / h_a).ln(),
            dw: (w / w_a).ln(),
        }
    }

    /// Applies the offsets to the anchor.
    pub fn decode(&self, anchor: &TLHW<f64>) -> Result<TLHW<f64>> {
        let [y_a, x_a, h_a, w_a] = anchor.tlhw();
        let Self { dy, dx, dh, dw } = *self;
        TLHW::try_from_tlhw([
            y_a + dy * h_a,
            x_a + dx * w_a,
            dh.exp() * h_a,
            dw.exp() * w_a,
        ])
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.dy, self.dx, self.dh, self.dw]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn identical_boxes_have_zero_delta() {
        let rect = TLHW::from_tlhw([2.0, 2.0, 4.0, 4.0]);
        let delta = BoxDelta::encode(&rect, &rect);
        assert_eq!(delta.to_array(), [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn encode_known_values() {
        let anchor = TLHW::from_tlhw([10.0, 20.0, 30.0, 12.0]);
        let truth = TLHW::from_tlhw([16.0, 17.0, 60.0, 6.0]);
        let delta = BoxDelta::encode(&anchor, &truth);

        assert_abs_diff_eq!(delta.dy, 0.2);
        assert_abs_diff_eq!(delta.dx, -0.25);
        assert_abs_diff_eq!(delta.dh, 2f64.ln());
        assert_abs_diff_eq!(delta.dw, 0.5f64.ln());
    }

    #[test]
    fn decode_inverts_encode() -> Result<()> {
        let anchor = TLHW::from_tlhw([-7.0, 1.85, 30.0, 12.3]);
        let truth = TLHW::from_tlhw([3.5, 8.25, 42.0, 17.0]);
        let decoded = BoxDelta::encode(&anchor, &truth).decode(&anchor)?;

        izip!(decoded.tlhw(), truth.tlhw()).for_each(|(lhs, rhs)| {
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-9);
        });
        Ok(())
    }
}
