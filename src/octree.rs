//! Adaptive palette construction by octree quantization.
//!
//! Source colors are truncated to 5 bits per channel and counted. Each unique
//! color becomes a leaf of an 8-ary tree five levels deep (one bit of R, G and
//! B per level, most significant first). Leaves are then folded into their
//! parents, always starting at the least populated node whose children are
//! all leaves, until the palette budget is met. The surviving leaves' centroids
//! are the palette.

use std::time::Instant;

use tracing::trace;

use crate::bitmap::Bitmap;
use crate::palette::ColorRgb;
use crate::{try_alloc, Result, SixelError};

/// Number of distinct 15-bit colors.
pub const COLORMAP_SIZE: usize = 32768;

const DEPTH: u32 = 5;

#[derive(Clone, Copy, Debug, Default)]
struct Node {
    /// Pixels at or below this node
    count: u64,
    /// Channel sums, only meaningful on leaves
    r: u64,
    g: u64,
    b: u64,
    /// Index of the first of eight consecutive children
    children: Option<usize>,
}

/// Arena-allocated color octree; node 0 is the root.
#[derive(Debug)]
pub struct Octree {
    nodes: Vec<Node>,
    leaves: usize,
}

/// Packs 5-bit channels into a colormap index.
#[inline]
pub(crate) fn rgb555(r5: u32, g5: u32, b5: u32) -> usize {
    ((r5 << 10) | (g5 << 5) | b5) as usize
}

/// Counts the 5-bit truncated colors of `src`. Counts saturate.
///
/// A non-negative `gain` scales the channels by `gain / 256` first.
pub fn colormap(src: &Bitmap, gain: i32) -> Result<Vec<u32>> {
    let mut map: Vec<u32> = try_alloc(COLORMAP_SIZE, "colormap")?;
    for i in 0..src.width * src.height {
        let s = src.sample(i);
        let mut r5 = (s.r >> 3) as u32;
        let mut g5 = (s.g >> 3) as u32;
        let mut b5 = (s.b >> 3) as u32;
        if gain >= 0 {
            let gain = gain as u32;
            r5 = (r5 * gain / 256).min(31);
            g5 = (g5 * gain / 256).min(31);
            b5 = (b5 * gain / 256).min(31);
        }
        let slot = &mut map[rgb555(r5, g5, b5)];
        *slot = slot.saturating_add(1);
    }
    Ok(map)
}

impl Octree {
    /// Inserts every non-zero colormap entry.
    pub fn from_colormap(colormap: &[u32]) -> Result<Self> {
        let mut tree = Octree {
            nodes: Vec::new(),
            leaves: 0,
        };
        tree.nodes
            .try_reserve(1)
            .map_err(|_| SixelError::Allocation("octree"))?;
        tree.nodes.push(Node::default());

        for (v, &count) in colormap.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let r5 = ((v >> 10) & 0x1f) as u32;
            let g5 = ((v >> 5) & 0x1f) as u32;
            let b5 = (v & 0x1f) as u32;
            tree.add(r5, g5, b5, count as u64)?;
        }
        Ok(tree)
    }

    fn add(&mut self, r5: u32, g5: u32, b5: u32, count: u64) -> Result<()> {
        let mut node = 0;
        for level in 0..DEPTH {
            self.nodes[node].count += count;
            let first = match self.nodes[node].children {
                Some(first) => first,
                None => {
                    let first = self.nodes.len();
                    self.nodes
                        .try_reserve(8)
                        .map_err(|_| SixelError::Allocation("octree"))?;
                    self.nodes.extend([Node::default(); 8]);
                    self.nodes[node].children = Some(first);
                    first
                }
            };
            let shift = DEPTH - 1 - level;
            let n = (((r5 >> shift) & 1) << 2) | (((g5 >> shift) & 1) << 1) | ((b5 >> shift) & 1);
            node = first + n as usize;
        }

        let leaf = &mut self.nodes[node];
        if leaf.count == 0 {
            self.leaves += 1;
        }
        leaf.count += count;
        leaf.r += ((r5 << 3) as u64) * count;
        leaf.g += ((g5 << 3) as u64) * count;
        leaf.b += ((b5 << 3) as u64) * count;
        Ok(())
    }

    /// Number of populated leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves
    }

    fn is_leaf(&self, node: usize) -> bool {
        self.nodes[node].children.is_none()
    }

    /// Least populated node whose children are all leaves, first in depth-first order on ties.
    fn find_min_node(&self, node: usize, min: &mut u64) -> Option<usize> {
        let first = self.nodes[node].children?;
        let has_grandchild = (first..first + 8).any(|c| !self.is_leaf(c));
        if has_grandchild {
            let mut found = None;
            for c in first..first + 8 {
                if let Some(n) = self.find_min_node(c, min) {
                    found = Some(n);
                }
            }
            found
        } else if self.nodes[node].count < *min {
            *min = self.nodes[node].count;
            Some(node)
        } else {
            None
        }
    }

    /// Folds leaves until at most `budget` remain.
    ///
    /// If collapsing a whole node would undershoot, only its smallest children
    /// are folded together, so the result is exactly `min(leaves, budget)`.
    pub fn reduce_to(&mut self, budget: usize) -> usize {
        let budget = budget.max(1);
        let mut merges = 0;
        while self.leaves > budget {
            let mut min = u64::MAX;
            let Some(node) = self.find_min_node(0, &mut min) else {
                break;
            };
            let Some(first) = self.nodes[node].children else {
                break;
            };
            let mut populated: Vec<usize> = (first..first + 8)
                .filter(|&c| self.nodes[c].count != 0)
                .collect();
            let excess = self.leaves - budget;

            if populated.len() <= excess + 1 {
                let (mut r, mut g, mut b) = (0, 0, 0);
                for &c in &populated {
                    r += self.nodes[c].r;
                    g += self.nodes[c].g;
                    b += self.nodes[c].b;
                }
                let parent = &mut self.nodes[node];
                parent.r = r;
                parent.g = g;
                parent.b = b;
                parent.children = None;
                self.leaves = self.leaves + 1 - populated.len();
            } else {
                populated.sort_by_key(|&c| self.nodes[c].count);
                let (into, rest) = (populated[0], &populated[1..=excess]);
                for &c in rest {
                    let child = std::mem::take(&mut self.nodes[c]);
                    let target = &mut self.nodes[into];
                    target.count += child.count;
                    target.r += child.r;
                    target.g += child.g;
                    target.b += child.b;
                }
                self.leaves -= excess;
            }
            merges += 1;
        }
        merges
    }

    /// Centroids of the populated leaves, in depth-first order.
    pub fn palette(&self) -> Vec<ColorRgb> {
        let mut pal = Vec::with_capacity(self.leaves);
        self.collect(0, &mut pal);
        pal
    }

    fn collect(&self, node: usize, pal: &mut Vec<ColorRgb>) {
        let n = &self.nodes[node];
        match n.children {
            Some(first) => {
                for c in first..first + 8 {
                    self.collect(c, pal);
                }
            }
            None if n.count != 0 => pal.push(ColorRgb::new(
                (n.r / n.count) as u8,
                (n.g / n.count) as u8,
                (n.b / n.count) as u8,
            )),
            None => {}
        }
    }
}

/// Builds a palette of at most `count` colors representing `src`.
pub fn adaptive_palette(src: &Bitmap, gain: i32, count: usize) -> Result<Vec<ColorRgb>> {
    let start = Instant::now();
    let map = colormap(src, gain)?;
    let unique = map.iter().filter(|&&c| c != 0).count();
    trace!(unique, elapsed = ?start.elapsed(), "colormap");

    let start = Instant::now();
    let mut tree = Octree::from_colormap(&map)?;
    trace!(nodes = tree.nodes.len(), elapsed = ?start.elapsed(), "octree built");

    let start = Instant::now();
    let merges = tree.reduce_to(count);
    trace!(merges, leaves = tree.leaf_count(), elapsed = ?start.elapsed(), "octree merged");

    let palette = tree.palette();
    if palette.is_empty() || palette.len() > count {
        return Err(SixelError::Quantization(format!(
            "octree produced {} colors for a budget of {}",
            palette.len(),
            count
        )));
    }
    Ok(palette)
}
