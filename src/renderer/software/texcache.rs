//! ---------------------------------------------------------------------------
//! Composite texture cache
//!
//! Holds, per (poly-texture, mip level), the base texture pre-multiplied by
//! its lightmap. Entries live in a slab and are threaded on an intrusive
//! most-recently-used list; the total texel storage stays within a byte
//! budget by evicting from the tail.
//!
//! Per-texel alpha is carried alongside, and texels equal to the texture's
//! key colour are stored unlit so key tests still match after lighting.
//!
//! Lighting changes only mark 16×16-texel cells dirty. Dirty cells are
//! recomposited lazily, and only where a later `acquire` asks for them.
//! ---------------------------------------------------------------------------

use std::collections::HashMap;

use crate::{
    renderer::{Rgba, software::pixel},
    world::{
        lightmap::{LUMEL_SHIFT, LumelRect},
        polygon::{PolyTexture, PolyTextureKey},
        texture::TextureBank,
    },
};

/// log2 of the dirty-cell edge length in texels.
pub const CELL_SHIFT: u32 = 4;
const CELL: usize = 1 << CELL_SHIFT;

pub const DEFAULT_BUDGET: usize = 8 << 20;

/// Half-open texel rectangle of a composited bitmap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TexelRect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl TexelRect {
    pub const EVERYTHING: TexelRect = TexelRect {
        x: 0,
        y: 0,
        w: usize::MAX,
        h: usize::MAX,
    };

    pub fn new(x: usize, y: usize, w: usize, h: usize) -> Self {
        Self { x, y, w, h }
    }

    /// Inclusive-exclusive cell range `(cx0, cy0, cx1, cy1)` touched by the
    /// rectangle inside a `cw × ch` cell grid.
    fn cells(&self, cw: usize, ch: usize) -> (usize, usize, usize, usize) {
        let x1 = self.x.saturating_add(self.w);
        let y1 = self.y.saturating_add(self.h);
        let cx0 = (self.x >> CELL_SHIFT).min(cw);
        let cy0 = (self.y >> CELL_SHIFT).min(ch);
        let cx1 = (x1.saturating_add(CELL - 1) >> CELL_SHIFT).min(cw);
        let cy1 = (y1.saturating_add(CELL - 1) >> CELL_SHIFT).min(ch);
        (cx0, cy0, cx1, cy1)
    }
}

/// Opaque reference to a pinned entry; valid until [`TextureCompositeCache::release`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheHandle {
    slot: usize,
    generation: u32,
}

/// A composited bitmap as seen by the rasterizer.
#[derive(Clone, Copy, Debug)]
pub struct CompositeView<'a> {
    pub texels: &'a [Rgba],
    /// Present when the base texture has an alpha channel.
    pub alpha: Option<&'a [u8]>,
    pub width: usize,
    pub height: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Entries refused because they alone exceed the budget, or because
    /// every resident entry was pinned.
    pub bypassed: u64,
    pub recomposited_cells: u64,
    pub resident_bytes: usize,
    pub budget: usize,
    pub entries: usize,
}

struct Entry {
    key: PolyTextureKey,
    mip: usize,
    width: usize,
    height: usize,
    texels: Vec<Rgba>,
    alpha: Option<Vec<u8>>,
    /// One bit per cell, row-major.
    dirty: Vec<u64>,
    dirty_count: usize,
    cells_w: usize,
    cells_h: usize,
    prev: Option<usize>,
    next: Option<usize>,
    pins: u32,
    generation: u32,
}

impl Entry {
    fn bytes(&self) -> usize {
        entry_bytes(self.texels.len(), self.alpha.is_some())
    }

    #[inline]
    fn is_dirty(&self, cell: usize) -> bool {
        self.dirty[cell >> 6] & (1 << (cell & 63)) != 0
    }

    fn mark(&mut self, rect: TexelRect) {
        let (cx0, cy0, cx1, cy1) = rect.cells(self.cells_w, self.cells_h);
        for cy in cy0..cy1 {
            for cx in cx0..cx1 {
                let cell = cy * self.cells_w + cx;
                if !self.is_dirty(cell) {
                    self.dirty[cell >> 6] |= 1 << (cell & 63);
                    self.dirty_count += 1;
                }
            }
        }
    }

    /// Rebuild dirty cells inside `rect`; returns how many were rebuilt.
    fn refresh(&mut self, source: &PolyTexture, bank: &TextureBank, rect: TexelRect) -> usize {
        if self.dirty_count == 0 {
            return 0;
        }
        let (cx0, cy0, cx1, cy1) = rect.cells(self.cells_w, self.cells_h);
        let mut rebuilt = 0;
        for cy in cy0..cy1 {
            for cx in cx0..cx1 {
                let cell = cy * self.cells_w + cx;
                if self.is_dirty(cell) {
                    self.composite_cell(source, bank, cx, cy);
                    self.dirty[cell >> 6] &= !(1 << (cell & 63));
                    self.dirty_count -= 1;
                    rebuilt += 1;
                }
            }
        }
        rebuilt
    }

    fn composite_cell(&mut self, source: &PolyTexture, bank: &TextureBank, cx: usize, cy: usize) {
        let texture = bank.texture_or_missing(source.texture);
        let level = texture.level(self.mip);
        let mip = self.mip;
        let u0 = (source.u_min >> mip) as i64;
        let v0 = (source.v_min >> mip) as i64;

        let x_end = ((cx + 1) * CELL).min(self.width);
        let y_end = ((cy + 1) * CELL).min(self.height);
        for ty in cy * CELL..y_end {
            let sy = (v0 + ty as i64).rem_euclid(level.h as i64) as usize;
            let row = ty * self.width;
            for tx in cx * CELL..x_end {
                let sx = (u0 + tx as i64).rem_euclid(level.w as i64) as usize;
                let texel = level.texel(sx, sy);
                self.texels[row + tx] = if texture.key_color == Some(texel) {
                    texel
                } else {
                    pixel::modulate(texel, source.lightmap.sample(tx << mip, ty << mip))
                };
                if let (Some(dst), Some(src)) = (self.alpha.as_mut(), level.alpha.as_ref()) {
                    dst[row + tx] = src[sy * level.w + sx];
                }
            }
        }
    }
}

/// Storage of a `texels`-sized composite, with or without an alpha plane.
fn entry_bytes(texels: usize, alpha: bool) -> usize {
    texels * (size_of::<Rgba>() + usize::from(alpha))
}

/// LRU cache of lightmapped textures, bounded by a byte budget.
pub struct TextureCompositeCache {
    slots: Vec<Option<Entry>>,
    free: Vec<usize>,
    index: HashMap<(PolyTextureKey, usize), usize>,
    head: Option<usize>,
    tail: Option<usize>,
    resident: usize,
    budget: usize,
    next_generation: u32,
    stats: CacheStats,
}

impl Default for TextureCompositeCache {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET)
    }
}

impl TextureCompositeCache {
    pub fn new(budget: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            resident: 0,
            budget,
            next_generation: 0,
            stats: CacheStats::default(),
        }
    }

    /// Composited bitmap of `source` at `mip`, with every dirty cell
    /// intersecting `region` brought up to date. The entry stays pinned
    /// (never evicted) until released.
    ///
    /// `None` if the bitmap cannot be made resident within the budget; the
    /// caller should draw the unlit texture instead.
    pub fn acquire(
        &mut self,
        source: &PolyTexture,
        bank: &TextureBank,
        mip: usize,
        region: TexelRect,
    ) -> Option<CacheHandle> {
        if let Some(&slot) = self.index.get(&(source.key, mip)) {
            self.stats.hits += 1;
            self.touch(slot);
            let entry = self.slots[slot].as_mut()?;
            let rebuilt = entry.refresh(source, bank, region);
            self.stats.recomposited_cells += rebuilt as u64;
            entry.pins += 1;
            return Some(CacheHandle {
                slot,
                generation: entry.generation,
            });
        }

        self.stats.misses += 1;
        let width = (source.width >> mip).max(1);
        let height = (source.height >> mip).max(1);
        let has_alpha = bank.texture_or_missing(source.texture).has_alpha();
        let bytes = entry_bytes(width * height, has_alpha);
        if bytes > self.budget || !self.make_room(bytes) {
            self.stats.bypassed += 1;
            log::trace!(
                "composite {}@{} ({} bytes) bypasses the cache",
                source.key,
                mip,
                bytes
            );
            return None;
        }

        let cells_w = width.div_ceil(CELL);
        let cells_h = height.div_ceil(CELL);
        let cells = cells_w * cells_h;
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);

        let mut entry = Entry {
            key: source.key,
            mip,
            width,
            height,
            texels: vec![0; width * height],
            alpha: has_alpha.then(|| vec![0; width * height]),
            dirty: vec![0; cells.div_ceil(64)],
            dirty_count: 0,
            cells_w,
            cells_h,
            prev: None,
            next: None,
            pins: 1,
            generation,
        };
        entry.mark(TexelRect::EVERYTHING);
        let rebuilt = entry.refresh(source, bank, TexelRect::EVERYTHING);
        self.stats.recomposited_cells += rebuilt as u64;

        let slot = match self.free.pop() {
            Some(s) => {
                self.slots[s] = Some(entry);
                s
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        self.index.insert((source.key, mip), slot);
        self.push_front(slot);
        self.resident += bytes;
        Some(CacheHandle { slot, generation })
    }

    /// Borrow a pinned bitmap.
    pub fn bitmap(&self, handle: CacheHandle) -> Option<CompositeView<'_>> {
        let entry = self.live(handle)?;
        Some(CompositeView {
            texels: &entry.texels,
            alpha: entry.alpha.as_deref(),
            width: entry.width,
            height: entry.height,
        })
    }

    /// Unpin an entry handed out by [`acquire`](Self::acquire).
    pub fn release(&mut self, handle: CacheHandle) {
        if let Some(Some(entry)) = self.slots.get_mut(handle.slot) {
            if entry.generation == handle.generation {
                entry.pins = entry.pins.saturating_sub(1);
            }
        }
    }

    /// Mark every cell of every mip of `key` dirty. Storage is kept.
    pub fn invalidate(&mut self, key: PolyTextureKey) {
        for entry in self.slots.iter_mut().flatten() {
            if entry.key == key {
                entry.mark(TexelRect::EVERYTHING);
            }
        }
    }

    /// Mark the cells affected by a change to lumels `rect` of `key`'s
    /// lightmap. Bilinear light reaches one lumel beyond the rectangle.
    pub fn invalidate_region(&mut self, key: PolyTextureKey, rect: LumelRect) {
        let x0 = rect.x.saturating_sub(1) << LUMEL_SHIFT;
        let y0 = rect.y.saturating_sub(1) << LUMEL_SHIFT;
        let x1 = (rect.x + rect.w + 1) << LUMEL_SHIFT;
        let y1 = (rect.y + rect.h + 1) << LUMEL_SHIFT;
        for entry in self.slots.iter_mut().flatten() {
            if entry.key != key {
                continue;
            }
            let m = entry.mip;
            let sx0 = x0 >> m;
            let sy0 = y0 >> m;
            let sx1 = (x1 + (1 << m) - 1) >> m;
            let sy1 = (y1 + (1 << m) - 1) >> m;
            entry.mark(TexelRect::new(sx0, sy0, sx1 - sx0, sy1 - sy0));
        }
    }

    /// Drop every entry, pinned or not.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.resident = 0;
    }

    /// Change the budget, evicting unpinned entries until it holds.
    pub fn set_budget(&mut self, budget: usize) {
        self.budget = budget;
        if !self.make_room(0) {
            log::warn!(
                "composite cache holds {} bytes of pinned entries over its {} byte budget",
                self.resident,
                budget
            );
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn resident_bytes(&self) -> usize {
        self.resident
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: PolyTextureKey, mip: usize) -> bool {
        self.index.contains_key(&(key, mip))
    }

    /// Dirty cells currently recorded for `(key, mip)`.
    pub fn dirty_cells(&self, key: PolyTextureKey, mip: usize) -> usize {
        self.index
            .get(&(key, mip))
            .and_then(|&s| self.slots[s].as_ref())
            .map_or(0, |e| e.dirty_count)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resident_bytes: self.resident,
            budget: self.budget,
            entries: self.index.len(),
            ..self.stats
        }
    }

    /*──────────────────────── internal helpers ────────────────────────*/

    fn live(&self, handle: CacheHandle) -> Option<&Entry> {
        self.slots
            .get(handle.slot)?
            .as_ref()
            .filter(|e| e.generation == handle.generation)
    }

    /// Evict least recently used, unpinned entries until `extra` more bytes
    /// fit. `false` if that is impossible.
    fn make_room(&mut self, extra: usize) -> bool {
        let mut cursor = self.tail;
        while self.resident + extra > self.budget {
            let Some(slot) = cursor else {
                return false;
            };
            let (prev, pinned) = match &self.slots[slot] {
                Some(e) => (e.prev, e.pins > 0),
                None => return false,
            };
            cursor = prev;
            if !pinned {
                self.evict(slot);
            }
        }
        true
    }

    fn evict(&mut self, slot: usize) {
        self.unlink(slot);
        if let Some(entry) = self.slots[slot].take() {
            log::debug!(
                "evicting composite {}@{} ({} bytes)",
                entry.key,
                entry.mip,
                entry.bytes()
            );
            self.index.remove(&(entry.key, entry.mip));
            self.resident -= entry.bytes();
            self.stats.evictions += 1;
            self.free.push(slot);
        }
    }

    fn touch(&mut self, slot: usize) {
        if self.head != Some(slot) {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    fn push_front(&mut self, slot: usize) {
        let old = self.head;
        if let Some(e) = self.slots[slot].as_mut() {
            e.prev = None;
            e.next = old;
        }
        match old.and_then(|h| self.slots[h].as_mut()) {
            Some(h) => h.prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.slots[slot].as_mut() {
            Some(e) => (e.prev.take(), e.next.take()),
            None => return,
        };
        match prev.and_then(|p| self.slots[p].as_mut()) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.slots[n].as_mut()) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
    }
}

/*──────────────────────────────── Tests ───────────────────────────────*/
#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::texture::{Texture, TextureId};

    fn bank_with_white(w: usize, h: usize) -> (TextureBank, TextureId) {
        let mut bank = TextureBank::default_with_checker();
        let mut tex = Texture::new("WHITE", w, h, vec![0x00FF_FFFF; w * h]).unwrap();
        tex.build_mipmaps(4);
        let id = bank.insert("WHITE", tex).unwrap();
        (bank, id)
    }

    /// 64×64 region: 16 cells, 16 KiB at mip 0.
    fn poly(key: PolyTextureKey, tex: TextureId) -> PolyTexture {
        PolyTexture::new(key, tex, 0, 0, 64, 64)
    }

    #[test]
    fn miss_then_hit_composites_lightmap() {
        let (bank, tex) = bank_with_white(16, 16);
        let mut p = poly(1, tex);
        for y in 0..p.lightmap.height() {
            for x in 0..p.lightmap.width() {
                p.lightmap.set(x, y, [128, 255, 0]);
            }
        }
        let mut cache = TextureCompositeCache::new(1 << 20);
        let h = cache.acquire(&p, &bank, 0, TexelRect::EVERYTHING).unwrap();
        {
            let bmp = cache.bitmap(h).unwrap();
            assert_eq!((bmp.width, bmp.height), (64, 64));
            assert!(bmp.texels.iter().all(|&t| t == 0x0080_FF00));
        }
        cache.release(h);
        let h2 = cache.acquire(&p, &bank, 0, TexelRect::EVERYTHING).unwrap();
        cache.release(h2);

        let s = cache.stats();
        assert_eq!((s.hits, s.misses), (1, 1));
        assert_eq!(s.recomposited_cells, 16);
        assert_eq!(s.resident_bytes, 64 * 64 * 4);
        assert_eq!(cache.bitmap(h2).unwrap().width, 64);
    }

    #[test]
    fn mip_levels_are_separate_entries() {
        let (bank, tex) = bank_with_white(16, 16);
        let p = poly(1, tex);
        let mut cache = TextureCompositeCache::new(1 << 20);
        let a = cache.acquire(&p, &bank, 0, TexelRect::EVERYTHING).unwrap();
        let b = cache.acquire(&p, &bank, 2, TexelRect::EVERYTHING).unwrap();
        assert_eq!(cache.bitmap(b).unwrap().width, 16);
        assert_eq!(cache.len(), 2);
        cache.release(a);
        cache.release(b);
    }

    #[test]
    fn invalidate_recomposites_only_requested_region() {
        let (bank, tex) = bank_with_white(16, 16);
        let mut p = poly(7, tex);
        let mut cache = TextureCompositeCache::new(1 << 20);
        let h = cache.acquire(&p, &bank, 0, TexelRect::EVERYTHING).unwrap();
        cache.release(h);

        // darken the whole lightmap but only report the top-left lumel
        let touched = p.lightmap.fill_rect(LumelRect { x: 0, y: 0, w: 5, h: 5 }, [0; 3]);
        assert_eq!(touched.w, 5);
        cache.invalidate_region(7, LumelRect { x: 0, y: 0, w: 1, h: 1 });
        // lumel 0 plus one lumel of bleed → texels 0..32 → 2×2 cells
        assert_eq!(cache.dirty_cells(7, 0), 4);

        // asking for one cell rebuilds only that cell
        let h = cache.acquire(&p, &bank, 0, TexelRect::new(0, 0, 4, 4)).unwrap();
        assert_eq!(cache.dirty_cells(7, 0), 3);
        {
            let bmp = cache.bitmap(h).unwrap();
            assert_eq!(bmp.texels[0], 0, "rebuilt with new lighting");
            assert_eq!(bmp.texels[40 * 64 + 40], 0x00FF_FFFF, "outside region keeps old content");
        }
        cache.release(h);

        cache.invalidate(7);
        assert_eq!(cache.dirty_cells(7, 0), 16);
        let h = cache.acquire(&p, &bank, 0, TexelRect::EVERYTHING).unwrap();
        assert_eq!(cache.dirty_cells(7, 0), 0);
        assert!(cache.bitmap(h).unwrap().texels.iter().all(|&t| t == 0));
        cache.release(h);
    }

    #[test]
    fn eviction_is_lru_and_respects_budget() {
        let (bank, tex) = bank_with_white(16, 16);
        let entry = 64 * 64 * 4;
        let mut cache = TextureCompositeCache::new(entry * 3);
        for key in 1..=3 {
            let h = cache.acquire(&poly(key, tex), &bank, 0, TexelRect::EVERYTHING).unwrap();
            cache.release(h);
        }
        // refresh 1 so 2 becomes least recently used
        let h = cache.acquire(&poly(1, tex), &bank, 0, TexelRect::EVERYTHING).unwrap();
        cache.release(h);
        let h = cache.acquire(&poly(4, tex), &bank, 0, TexelRect::EVERYTHING).unwrap();
        cache.release(h);

        assert!(cache.resident_bytes() <= cache.budget());
        assert!(!cache.contains(2, 0));
        assert!(cache.contains(1, 0) && cache.contains(3, 0) && cache.contains(4, 0));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn pinned_entries_survive_pressure() {
        let (bank, tex) = bank_with_white(16, 16);
        let entry = 64 * 64 * 4;
        let mut cache = TextureCompositeCache::new(entry * 2);
        let pinned = cache.acquire(&poly(1, tex), &bank, 0, TexelRect::EVERYTHING).unwrap();
        let h = cache.acquire(&poly(2, tex), &bank, 0, TexelRect::EVERYTHING).unwrap();
        cache.release(h);
        let h = cache.acquire(&poly(3, tex), &bank, 0, TexelRect::EVERYTHING).unwrap();
        assert!(cache.contains(1, 0), "pinned entry evicted");
        assert!(!cache.contains(2, 0));

        // both resident entries pinned: nothing more fits
        assert!(cache.acquire(&poly(4, tex), &bank, 0, TexelRect::EVERYTHING).is_none());
        assert!(cache.resident_bytes() <= cache.budget());
        cache.release(h);
        cache.release(pinned);
        assert_eq!(cache.stats().bypassed, 1);
    }

    #[test]
    fn oversize_entry_bypasses_and_stale_handle_is_rejected() {
        let (bank, tex) = bank_with_white(16, 16);
        let mut cache = TextureCompositeCache::new(1024);
        assert!(cache.acquire(&poly(1, tex), &bank, 0, TexelRect::EVERYTHING).is_none());
        let h = cache.acquire(&poly(1, tex), &bank, 4, TexelRect::EVERYTHING).unwrap();
        cache.release(h);
        cache.clear();
        assert!(cache.bitmap(h).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.resident_bytes(), 0);
    }

    #[test]
    fn tiling_offset_follows_u_min() {
        let mut bank = TextureBank::default_with_checker();
        let pixels = (0..16).map(|i| i as Rgba).collect();
        let tex = bank.insert("RAMP", Texture::new("RAMP", 4, 4, pixels).unwrap()).unwrap();
        let p = PolyTexture::new(9, tex, -1, 2, 8, 8);
        let mut cache = TextureCompositeCache::new(1 << 20);
        let h = cache.acquire(&p, &bank, 0, TexelRect::EVERYTHING).unwrap();
        let bmp = cache.bitmap(h).unwrap();
        // texel (0,0) comes from source (-1 mod 4, 2) = (3, 2)
        assert_eq!(bmp.texels[0], 2 * 4 + 3);
        assert_eq!(bmp.texels[1], 2 * 4);
    }

    #[test]
    fn alpha_plane_travels_with_the_composite() {
        let mut bank = TextureBank::default_with_checker();
        let alpha = (0..16 * 16).map(|i| if i % 2 == 0 { 0 } else { 200 }).collect();
        let tex = Texture::new("GLASS", 16, 16, vec![0x00FF_0000; 16 * 16])
            .unwrap()
            .with_alpha(alpha)
            .unwrap();
        let tex = bank.insert("GLASS", tex).unwrap();
        let p = PolyTexture::new(3, tex, 0, 0, 16, 16);
        let mut cache = TextureCompositeCache::new(1 << 20);
        let h = cache.acquire(&p, &bank, 0, TexelRect::EVERYTHING).unwrap();
        {
            let bmp = cache.bitmap(h).unwrap();
            let alpha = bmp.alpha.unwrap();
            assert_eq!(&alpha[..4], &[0, 200, 0, 200]);
        }
        cache.release(h);
        assert_eq!(cache.resident_bytes(), 16 * 16 * 5);
    }

    #[test]
    fn key_colour_texels_stay_unlit() {
        let mut bank = TextureBank::default_with_checker();
        let mut pixels = vec![0x0000_00FF; 16 * 16];
        pixels[1] = 0x00FF_FFFF;
        let tex = Texture::new("FENCE", 16, 16, pixels).unwrap().with_key_color(0x0000_00FF);
        let tex = bank.insert("FENCE", tex).unwrap();
        let mut p = PolyTexture::new(4, tex, 0, 0, 16, 16);
        p.lightmap.fill_rect(LumelRect { x: 0, y: 0, w: 2, h: 2 }, [128; 3]);
        let mut cache = TextureCompositeCache::new(1 << 20);
        let h = cache.acquire(&p, &bank, 0, TexelRect::EVERYTHING).unwrap();
        {
            let bmp = cache.bitmap(h).unwrap();
            assert_eq!(bmp.texels[0], 0x0000_00FF);
            assert_eq!(bmp.texels[1], 0x0080_8080);
            assert!(bmp.alpha.is_none());
        }
        cache.release(h);
    }
}
