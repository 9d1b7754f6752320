//! Page Planning
//!
//! One tall bitmap, many pages: every page shows the same image, shifted up
//! by one page height more than the previous page. The final page is cut
//! to the remaining content instead of being letterboxed.

/// One page's window onto the continuous image, in output units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSlice {
    pub index: usize,
    /// Distance from the top of the image to the top of this page
    pub start: f32,
    /// Visible height; equal to the page height except on the last page
    pub height: f32,
}

impl PageSlice {
    /// Vertical offset at which the image is drawn on this page.
    pub fn offset(&self) -> f32 {
        -self.start
    }

    pub fn end(&self) -> f32 {
        self.start + self.height
    }
}

/// Cut `total_height` into `ceil(total_height / page_height)` slices.
pub fn plan_pages(total_height: f32, page_height: f32) -> Vec<PageSlice> {
    if !(total_height > 0.0 && page_height > 0.0) {
        return Vec::new();
    }
    let count = (total_height / page_height).ceil().max(1.0) as usize;
    (0..count)
        .map(|index| {
            let start = index as f32 * page_height;
            PageSlice {
                index,
                start,
                height: (total_height - start).min(page_height),
            }
        })
        .collect()
}
