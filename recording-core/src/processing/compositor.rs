use std::collections::{BTreeSet, HashMap};

use crate::models::error::RecordingError;
use crate::models::frame::VideoYuvFrame;
use crate::models::layout::{RenderMode, VideoMixingLayout};
use crate::processing::yuv::{self, Plane, PlaneMut, PixelRect, SourceWindow};

/// A layout region bound to an active participant, in canvas pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedRegion {
    pub uid: u32,
    pub rect: PixelRect,
    pub alpha: f64,
    pub render_mode: RenderMode,
}

/// Video mixing compositor.
///
/// Holds the current layout, the set of active participants and the most
/// recent raw frame of each. The paint plan (visible regions, bottom to top)
/// is rebuilt whenever the layout or the active set changes, so a
/// composition pass only walks the plan.
///
/// Not internally synchronized; the engine keeps it behind a mutex so a
/// layout swap can never interleave with a composition pass.
#[derive(Debug, Default)]
pub struct Compositor {
    layout: Option<VideoMixingLayout>,
    active: BTreeSet<u32>,
    latest: HashMap<u32, VideoYuvFrame>,
    plan: Vec<PlacedRegion>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the layout. On error the previous layout stays in place.
    pub fn set_layout(&mut self, layout: VideoMixingLayout) -> Result<(), RecordingError> {
        layout.validate()?;
        self.layout = Some(layout);
        self.rebuild_plan();
        Ok(())
    }

    pub fn layout(&self) -> Option<&VideoMixingLayout> {
        self.layout.as_ref()
    }

    /// Visible regions in paint order.
    pub fn plan(&self) -> &[PlacedRegion] {
        &self.plan
    }

    pub fn participant_joined(&mut self, uid: u32) {
        if self.active.insert(uid) {
            self.rebuild_plan();
        }
    }

    /// Drop the participant and its pending frame; its regions go inert.
    pub fn participant_left(&mut self, uid: u32) {
        self.latest.remove(&uid);
        if self.active.remove(&uid) {
            self.rebuild_plan();
        }
    }

    /// Keep `frame` as the participant's current picture. Frames from
    /// participants outside the active set are discarded.
    pub fn submit(&mut self, uid: u32, frame: VideoYuvFrame) {
        if self.active.contains(&uid) {
            self.latest.insert(uid, frame);
        }
    }

    /// Number of participant frames currently held.
    pub fn pending_frames(&self) -> usize {
        self.latest.len()
    }

    /// Forget the layout, participants and every held frame.
    pub fn clear(&mut self) {
        self.layout = None;
        self.active.clear();
        self.latest.clear();
        self.plan.clear();
    }

    /// Render the canvas. `None` until a layout has been set.
    pub fn compose(&self, frame_ms: u32) -> Option<VideoYuvFrame> {
        let layout = self.layout.as_ref()?;
        let mut canvas = VideoYuvFrame::packed(frame_ms, layout.canvas_width, layout.canvas_height);
        let [bg_y, bg_u, bg_v] = yuv::rgb_to_yuv(layout.background());
        {
            let [mut y, mut u, mut v] = canvas_planes(&mut canvas);
            y.fill(bg_y);
            u.fill(bg_u);
            v.fill(bg_v);
        }
        for placed in &self.plan {
            if let Some(source) = self.latest.get(&placed.uid) {
                draw_region(&mut canvas, placed, source);
            }
        }
        Some(canvas)
    }

    fn rebuild_plan(&mut self) {
        self.plan.clear();
        let Some(ref layout) = self.layout else {
            return;
        };
        let (canvas_w, canvas_h) = (layout.canvas_width as usize, layout.canvas_height as usize);
        let scale = |unit: f64, extent: usize| ((unit * extent as f64).round() as usize).min(extent);
        for region in layout.paint_order() {
            if !self.active.contains(&region.uid) {
                continue;
            }
            let x = scale(region.x, canvas_w);
            let y = scale(region.y, canvas_h);
            let rect = PixelRect {
                x,
                y,
                width: scale(region.width, canvas_w).min(canvas_w - x),
                height: scale(region.height, canvas_h).min(canvas_h - y),
            };
            if rect.is_empty() {
                continue;
            }
            self.plan.push(PlacedRegion {
                uid: region.uid,
                rect,
                alpha: region.alpha,
                render_mode: region.render_mode,
            });
        }
        log::debug!("mixing plan rebuilt: {} visible regions", self.plan.len());
    }
}

fn canvas_planes(canvas: &mut VideoYuvFrame) -> [PlaneMut<'_>; 3] {
    let (width, height) = (canvas.width() as usize, canvas.height() as usize);
    let (chroma_w, chroma_h) = (width.div_ceil(2), height.div_ceil(2));
    let strides = canvas.strides().map(|s| s as usize);
    let (y, u, v) = canvas.planes_mut();
    [
        PlaneMut {
            data: y,
            stride: strides[0],
            width,
            height,
        },
        PlaneMut {
            data: u,
            stride: strides[1],
            width: chroma_w,
            height: chroma_h,
        },
        PlaneMut {
            data: v,
            stride: strides[2],
            width: chroma_w,
            height: chroma_h,
        },
    ]
}

/// Where the source lands inside `rect`, and which part of it is shown.
fn placement(rect: PixelRect, mode: RenderMode, src_w: usize, src_h: usize) -> (PixelRect, SourceWindow) {
    let (rw, rh) = (rect.width as f64, rect.height as f64);
    let (sw, sh) = (src_w as f64, src_h as f64);
    match mode {
        RenderMode::Hidden => {
            let scale = (rw / sw).max(rh / sh);
            let (visible_w, visible_h) = (rw / scale, rh / scale);
            let window = SourceWindow {
                x: (sw - visible_w) / 2.0,
                y: (sh - visible_h) / 2.0,
                width: visible_w,
                height: visible_h,
            };
            (rect, window)
        }
        RenderMode::Fit => {
            let scale = (rw / sw).min(rh / sh);
            let width = ((sw * scale).round() as usize).clamp(1, rect.width);
            let height = ((sh * scale).round() as usize).clamp(1, rect.height);
            let target = PixelRect {
                x: rect.x + (rect.width - width) / 2,
                y: rect.y + (rect.height - height) / 2,
                width,
                height,
            };
            let window = SourceWindow {
                x: 0.0,
                y: 0.0,
                width: sw,
                height: sh,
            };
            (target, window)
        }
    }
}

fn draw_region(canvas: &mut VideoYuvFrame, placed: &PlacedRegion, source: &VideoYuvFrame) {
    let (src_w, src_h) = (source.width() as usize, source.height() as usize);
    let [y_stride, u_stride, v_stride] = source.strides().map(|s| s as usize);
    if src_w == 0 || src_h == 0 {
        return;
    }
    let (target, window) = placement(placed.rect, placed.render_mode, src_w, src_h);
    let (chroma_w, chroma_h) = (src_w.div_ceil(2), src_h.div_ceil(2));
    let sources = [
        Plane {
            data: source.y_plane(),
            stride: y_stride,
            width: src_w,
            height: src_h,
        },
        Plane {
            data: source.u_plane(),
            stride: u_stride,
            width: chroma_w,
            height: chroma_h,
        },
        Plane {
            data: source.v_plane(),
            stride: v_stride,
            width: chroma_w,
            height: chroma_h,
        },
    ];
    for (index, (mut dst, src)) in canvas_planes(canvas).into_iter().zip(sources.iter()).enumerate() {
        let (rect, win) = if index == 0 {
            (target, window)
        } else {
            (target.to_chroma(), window.to_chroma())
        };
        yuv::blend_scaled(&mut dst, rect, src, win, placed.alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::layout::{Region, Rgb};

    fn solid(width: u32, height: u32, luma: u8) -> VideoYuvFrame {
        let mut frame = VideoYuvFrame::packed(0, width, height);
        let (y, u, v) = frame.planes_mut();
        y.fill(luma);
        u.fill(128);
        v.fill(128);
        frame
    }

    fn luma_row(frame: &VideoYuvFrame, row: usize) -> Vec<u8> {
        let stride = frame.strides()[0] as usize;
        frame.y_plane()[row * stride..row * stride + frame.width() as usize].to_vec()
    }

    fn full(uid: u32, z: u8) -> Region {
        Region::new(uid, 0.0, 0.0, 1.0, 1.0).with_z_order(z)
    }

    #[test]
    fn no_layout_no_output() {
        let mut compositor = Compositor::new();
        compositor.participant_joined(1);
        compositor.submit(1, solid(4, 4, 100));
        assert!(compositor.compose(0).is_none());
    }

    #[test]
    fn empty_layout_paints_background() {
        let mut compositor = Compositor::new();
        compositor
            .set_layout(VideoMixingLayout::new(4, 2).with_background(Rgb { r: 255, g: 255, b: 255 }))
            .unwrap();
        let canvas = compositor.compose(40).unwrap();
        assert_eq!(canvas.frame_ms, 40);
        assert!(canvas.y_plane().iter().all(|&p| p == 235));
        assert!(canvas.u_plane().iter().all(|&p| p == 128));
    }

    #[test]
    fn higher_z_order_is_on_top() {
        let mut compositor = Compositor::new();
        compositor.participant_joined(1);
        compositor.participant_joined(2);
        compositor
            .set_layout(VideoMixingLayout::new(4, 4).with_region(full(2, 1)).with_region(full(1, 0)))
            .unwrap();
        compositor.submit(1, solid(4, 4, 100));
        compositor.submit(2, solid(4, 4, 200));
        let canvas = compositor.compose(0).unwrap();
        assert!(canvas.y_plane().iter().all(|&p| p == 200));
    }

    #[test]
    fn equal_z_order_later_region_on_top() {
        let mut compositor = Compositor::new();
        compositor.participant_joined(1);
        compositor.participant_joined(2);
        compositor
            .set_layout(VideoMixingLayout::new(4, 4).with_region(full(1, 5)).with_region(full(2, 5)))
            .unwrap();
        compositor.submit(1, solid(4, 4, 100));
        compositor.submit(2, solid(4, 4, 200));
        let uids: Vec<u32> = compositor.plan().iter().map(|p| p.uid).collect();
        assert_eq!(uids, vec![1, 2]);
        assert!(compositor.compose(0).unwrap().y_plane().iter().all(|&p| p == 200));
    }

    #[test]
    fn departed_participant_region_goes_inert() {
        let mut compositor = Compositor::new();
        compositor.participant_joined(1);
        compositor.participant_joined(2);
        let layout = VideoMixingLayout::new(4, 2)
            .with_region(Region::new(1, 0.0, 0.0, 0.5, 1.0))
            .with_region(Region::new(2, 0.5, 0.0, 0.5, 1.0).with_z_order(1));
        compositor.set_layout(layout.clone()).unwrap();
        compositor.submit(1, solid(2, 2, 100));
        compositor.submit(2, solid(2, 2, 200));
        assert_eq!(luma_row(&compositor.compose(0).unwrap(), 0), vec![100, 100, 200, 200]);

        compositor.participant_left(2);
        assert_eq!(compositor.pending_frames(), 1);
        assert_eq!(luma_row(&compositor.compose(0).unwrap(), 0), vec![100, 100, 16, 16]);
        // The layout itself is untouched.
        assert_eq!(compositor.layout(), Some(&layout));

        // Re-admission makes the region live again once a frame arrives.
        compositor.participant_joined(2);
        compositor.submit(2, solid(2, 2, 50));
        assert_eq!(luma_row(&compositor.compose(0).unwrap(), 1), vec![100, 100, 50, 50]);
    }

    #[test]
    fn frames_from_inactive_participants_are_ignored() {
        let mut compositor = Compositor::new();
        compositor.set_layout(VideoMixingLayout::new(2, 2).with_region(full(9, 0))).unwrap();
        compositor.submit(9, solid(2, 2, 77));
        assert_eq!(compositor.pending_frames(), 0);
        assert!(compositor.plan().is_empty());
        assert!(compositor.compose(0).unwrap().y_plane().iter().all(|&p| p == 16));
    }

    #[test]
    fn invalid_layout_keeps_previous() {
        let mut compositor = Compositor::new();
        let good = VideoMixingLayout::new(4, 4).with_region(full(1, 0));
        compositor.set_layout(good.clone()).unwrap();
        let bad = VideoMixingLayout::new(4, 4).with_region(Region::new(1, 0.0, 0.0, 1.2, 1.0));
        assert!(compositor.set_layout(bad).is_err());
        assert!(compositor.set_layout(VideoMixingLayout::new(0, 4)).is_err());
        assert_eq!(compositor.layout(), Some(&good));
    }

    #[test]
    fn fit_mode_letterboxes() {
        let mut compositor = Compositor::new();
        compositor.participant_joined(1);
        compositor
            .set_layout(VideoMixingLayout::new(8, 4).with_region(full(1, 0).with_render_mode(RenderMode::Fit)))
            .unwrap();
        compositor.submit(1, solid(2, 2, 200));
        let canvas = compositor.compose(0).unwrap();
        for row in 0..4 {
            assert_eq!(luma_row(&canvas, row), vec![16, 16, 200, 200, 200, 200, 16, 16]);
        }
    }

    #[test]
    fn hidden_mode_crops_center() {
        let mut source = VideoYuvFrame::packed(0, 4, 2);
        {
            let (y, u, v) = source.planes_mut();
            y.copy_from_slice(&[10, 50, 150, 250, 10, 50, 150, 250]);
            u.fill(128);
            v.fill(128);
        }
        let mut compositor = Compositor::new();
        compositor.participant_joined(1);
        compositor.set_layout(VideoMixingLayout::new(2, 2).with_region(full(1, 0))).unwrap();
        compositor.submit(1, source);
        let canvas = compositor.compose(0).unwrap();
        assert_eq!(luma_row(&canvas, 0), vec![50, 150]);
        assert_eq!(luma_row(&canvas, 1), vec![50, 150]);
    }

    #[test]
    fn alpha_blends_over_background() {
        let mut compositor = Compositor::new();
        compositor.participant_joined(1);
        compositor
            .set_layout(VideoMixingLayout::new(2, 2).with_region(full(1, 0).with_alpha(0.5)))
            .unwrap();
        compositor.submit(1, solid(2, 2, 216));
        let canvas = compositor.compose(0).unwrap();
        // (216 + 16) / 2
        assert!(canvas.y_plane().iter().all(|&p| p == 116));
    }

    #[test]
    fn clear_drops_everything() {
        let mut compositor = Compositor::new();
        compositor.participant_joined(1);
        compositor.set_layout(VideoMixingLayout::new(2, 2).with_region(full(1, 0))).unwrap();
        compositor.submit(1, solid(2, 2, 1));
        compositor.clear();
        assert_eq!(compositor.pending_frames(), 0);
        assert!(compositor.layout().is_none());
        assert!(compositor.compose(0).is_none());
    }
}
