// pyramid.rs — Gaussian image pyramid

use crate::float_bm::FloatBitMap;

/// Level 0 is the source; level k is level k-1 run through
/// `downsample_half_gaussian`. Building stops once either dimension drops
/// below 2, so a `w x h` source yields `1 + floor(log2(min(w, h)))` levels.
#[derive(Debug, Clone)]
pub struct FloatImagePyramid {
    levels: Vec<FloatBitMap>,
}

impl FloatImagePyramid {
    pub fn build(src: FloatBitMap) -> Self {
        let mut levels = vec![src];
        loop {
            let Some(last) = levels.last() else { break };
            if last.width() < 2 || last.height() < 2 {
                break;
            }
            let next = last.downsample_half_gaussian();
            levels.push(next);
        }
        Self { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, k: usize) -> &FloatBitMap {
        &self.levels[k]
    }

    pub fn into_levels(self) -> Vec<FloatBitMap> {
        self.levels
    }
}
