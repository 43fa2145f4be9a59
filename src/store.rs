//! Log-structured color record store.
//!
//! The store owns a small region of raw NOR flash, split into erase pages. Records are
//! appended back-to-back behind a per-page preamble word; flash bits only move from 1 to 0, so
//! a record is never rewritten in place and a page is only recycled by erasing it whole. The
//! most recent record wins; older ones are just log history until their page is reclaimed.
//!
//! Page lifecycle: raw (all-ones) -> active (preamble written) -> full -> erasing -> active
//! and empty again. Reclaim runs as a split-phase erase driven from idle polls, so a save
//! never blocks the animation loop; the single exception is a one-page region, which has no
//! second page to switch to and erases in place.

use crate::color::{Hsv, RECORD_SIZE};
use crate::error::Error;
use crate::platform::Platform;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// First word of every page the store has initialized. Anything else in that position (other
/// than the all-ones erased pattern) marks the page as foreign or torn.
pub const PAGE_PREAMBLE: u32 = 0x0FEE_DBEE;

const PREAMBLE_SIZE: u32 = 4;
const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// The session dead-page mask is a u32, which bounds the region size.
const MAX_PAGES: u32 = 32;

/// Condition of one region page, as reported by [`RecordStore::statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageState {
    /// All-ones, never initialized by the store.
    Raw,
    /// Preamble written, room for more records.
    Active,
    /// The next record would cross the page boundary.
    Full,
    /// A partial erase is armed or in progress.
    Erasing,
    /// First word is neither the preamble nor all-ones.
    Stale,
    /// A driver fault retired the page for this session.
    Dead,
}

/// Region usage counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreStatistics {
    pub raw: u16,
    pub active: u16,
    pub full: u16,
    pub erasing: u16,
    pub stale: u16,
    pub dead: u16,
    /// Valid records across all readable pages, including superseded ones.
    pub records: u32,
}

/// Append-only record log over `pages` erase pages starting at `base`.
///
/// Single producer, single consumer: the write cursor lives in memory and is established once
/// by the mount scan, so nothing else may touch the region.
pub struct RecordStore<T: Platform> {
    flash: T,
    base: u32,
    pages: u32,
    /// Address of the most recent valid record, if any.
    last_record: Option<u32>,
    /// Where the next record goes. May sit just past a page end until the crossing is handled.
    next_free: u32,
    /// Set by every record write, cleared once the driver confirms the write.
    write_pending: bool,
    /// Base address of the page whose split-phase erase is in progress.
    erasing: Option<u32>,
    /// Session-local mask of pages retired after a driver fault.
    dead: u32,
}

impl<T: Platform> RecordStore<T> {
    /// Mounts the store: validates the region geometry, recovers stale pages (erasing
    /// synchronously is acceptable only here, at boot) and finds the write cursor.
    ///
    /// The scan walks pages low to high; the last page whose cursor is past its own preamble
    /// supplies the most recent record, and an empty later page never overrides an earlier
    /// non-empty one.
    pub fn new(base_address: u32, pages: u32, flash: T) -> Result<Self, Error> {
        if !RECORD_SIZE.is_multiple_of(T::WRITE_SIZE) || !RECORD_SIZE.is_multiple_of(T::READ_SIZE)
        {
            return Err(Error::UnsupportedFlash);
        }

        let page_len = T::ERASE_SIZE as u32;
        if !base_address.is_multiple_of(page_len) {
            return Err(Error::InvalidRegionOffset);
        }
        if pages == 0 || pages > MAX_PAGES {
            return Err(Error::InvalidRegionSize);
        }
        if T::ERASE_SIZE < PREAMBLE_SIZE as usize + RECORD_SIZE {
            // a page that cannot hold a single record is a configuration error
            return Err(Error::InvalidRegionSize);
        }
        if base_address as usize + pages as usize * T::ERASE_SIZE > flash.capacity() {
            return Err(Error::InvalidRegionSize);
        }

        let mut store = Self {
            flash,
            base: base_address,
            pages,
            last_record: None,
            next_free: base_address + PREAMBLE_SIZE,
            write_pending: false,
            erasing: None,
            dead: 0,
        };
        store.mount()?;
        Ok(store)
    }

    /// The most recent persisted color, or [`Hsv::DEFAULT`] when the region holds no valid
    /// record anywhere. Meant to be called once at boot, before any animation starts.
    pub fn find_last_record(&mut self) -> Result<Hsv, Error> {
        let Some(addr) = self.last_record else {
            return Ok(Hsv::DEFAULT);
        };

        let mut raw = [0u8; RECORD_SIZE];
        self.flash.read(addr, &mut raw).map_err(|_| Error::Flash)?;
        Ok(Hsv::from_record(raw).unwrap_or(Hsv::DEFAULT))
    }

    /// Appends a record at the cursor.
    ///
    /// Filling a page arms a split-phase erase of the just-filled page and moves the cursor
    /// into the next one; running past the region end wraps back to the first page, which
    /// prior [`poll_reclaim`](Self::poll_reclaim) cycles have already put back in service. A
    /// one-page region erases in place, synchronously.
    ///
    /// Fails with [`Error::Busy`] while a previous write or erase is unconfirmed; poll and
    /// retry. A driver fault retires the affected page for the rest of the session.
    pub fn write_record(&mut self, hsv: Hsv) -> Result<(), Error> {
        if self.is_busy() {
            return Err(Error::Busy);
        }

        let page_len = T::ERASE_SIZE as u32;
        let mut addr = self.next_free;

        let offset = (addr - self.base) % page_len;
        let crossed = offset == 0 || offset + RECORD_SIZE as u32 > page_len;
        if crossed {
            // the cursor only ends up past a preamble when a record was written there, so
            // stepping one record back always lands inside the page that just filled up
            let full_page = self.page_base(addr - RECORD_SIZE as u32);
            let target = self.next_usable_page(full_page)?;

            if self.is_dead(full_page) {
                // retired page, nothing to reclaim
            } else if target == full_page {
                // no second page to switch to; the wrap costs one blocking erase
                self.erase_blocking(full_page)?;
            } else {
                #[cfg(feature = "defmt")]
                trace!("write: page {:#x} full, arming partial erase", full_page);
                if self.flash.erase_page_begin(full_page).is_err() {
                    return Err(self.retire(full_page));
                }
                self.erasing = Some(full_page);
            }

            addr = target + PREAMBLE_SIZE;
        }

        let mut page = self.page_base(addr);
        if self.is_dead(page) {
            page = self.next_usable_page(page)?;
            addr = page + PREAMBLE_SIZE;
        }

        self.ensure_active(page)?;

        if self.flash.write(addr, &hsv.to_record()).is_err() {
            return Err(self.retire(page));
        }

        #[cfg(feature = "defmt")]
        trace!("write: record at {:#x}", addr);

        self.write_pending = true;
        self.last_record = Some(addr);
        self.next_free = addr + RECORD_SIZE as u32;
        Ok(())
    }

    /// Drives pending background work by one bounded increment; call from every idle tick.
    ///
    /// Order matters: the pending write is confirmed first, then an armed erase advances.
    /// When the erase completes the page immediately gets a fresh preamble, so on the next
    /// boot it reads as initialized-and-empty rather than raw. No-op when idle; an armed
    /// erase cannot be cancelled, only driven to completion.
    pub fn poll_reclaim(&mut self) -> Result<(), Error> {
        if self.write_pending {
            if !self.flash.write_done_check() {
                return Ok(());
            }
            self.write_pending = false;
        }

        let Some(page) = self.erasing else {
            return Ok(());
        };

        match self.flash.erase_page_continue() {
            Ok(false) => Ok(()),
            Ok(true) => {
                self.erasing = None;
                self.write_preamble(page)?;
                #[cfg(feature = "defmt")]
                trace!("reclaim: page {:#x} back in service", page);
                Ok(())
            }
            Err(_) => {
                self.erasing = None;
                Err(self.retire(page))
            }
        }
    }

    /// True while a write or erase cycle is unconfirmed. Writes are gated on this; reads of
    /// the region are not authoritative either until it clears.
    pub fn is_busy(&self) -> bool {
        self.write_pending || self.erasing.is_some()
    }

    /// Counts pages per state and valid records overall.
    pub fn statistics(&mut self) -> Result<StoreStatistics, Error> {
        let mut stats = StoreStatistics::default();

        for index in 0..self.pages {
            let page = self.page_address(index);
            let (state, records) = self.page_state(page)?;
            match state {
                PageState::Raw => stats.raw += 1,
                PageState::Active => stats.active += 1,
                PageState::Full => stats.full += 1,
                PageState::Erasing => stats.erasing += 1,
                PageState::Stale => stats.stale += 1,
                PageState::Dead => stats.dead += 1,
            }
            stats.records += records;
        }

        Ok(stats)
    }

    fn mount(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("mount: {} pages at {:#x}", self.pages, self.base);

        let mut winner = None;
        for index in 0..self.pages {
            let page = self.page_address(index);
            let first = self.read_word(page)?;

            if first != PAGE_PREAMBLE {
                if first != ERASED_WORD {
                    #[cfg(feature = "defmt")]
                    warn!("mount: stale page at {:#x}, erasing", page);
                    self.erase_blocking(page)?;
                }
                continue;
            }

            if let Some(cursor) = self.scan_page(page)? {
                winner = Some(cursor);
            }
        }

        match winner {
            Some(addr) => {
                self.last_record = Some(addr);
                self.next_free = addr + RECORD_SIZE as u32;
            }
            None => {
                self.last_record = None;
                self.next_free = self.base + PREAMBLE_SIZE;
            }
        }
        Ok(())
    }

    /// Address of the last in-use slot, or `None` when no record follows the preamble.
    ///
    /// A slot is in use iff it decodes to an in-range HSV value; the walk stops at the first
    /// slot that does not, so a torn write also ends the page's record run.
    fn scan_page(&mut self, page: u32) -> Result<Option<u32>, Error> {
        let page_len = T::ERASE_SIZE as u32;
        let mut cursor = None;

        let mut offset = PREAMBLE_SIZE;
        while offset + RECORD_SIZE as u32 <= page_len {
            let mut raw = [0u8; RECORD_SIZE];
            self.flash
                .read(page + offset, &mut raw)
                .map_err(|_| Error::Flash)?;
            if Hsv::from_record(raw).is_none() {
                break;
            }
            cursor = Some(page + offset);
            offset += RECORD_SIZE as u32;
        }

        Ok(cursor)
    }

    fn page_address(&self, index: u32) -> u32 {
        self.base + index * T::ERASE_SIZE as u32
    }

    fn page_base(&self, addr: u32) -> u32 {
        let page_len = T::ERASE_SIZE as u32;
        self.base + (addr - self.base) / page_len * page_len
    }

    fn read_word(&mut self, addr: u32) -> Result<u32, Error> {
        let mut raw = [0u8; 4];
        self.flash.read(addr, &mut raw).map_err(|_| Error::Flash)?;
        Ok(u32::from_le_bytes(raw))
    }

    fn write_preamble(&mut self, page: u32) -> Result<(), Error> {
        if self
            .flash
            .write(page, &PAGE_PREAMBLE.to_le_bytes())
            .is_err()
        {
            return Err(self.retire(page));
        }
        Ok(())
    }

    /// Makes sure the target page carries a preamble before the first record lands in it.
    fn ensure_active(&mut self, page: u32) -> Result<(), Error> {
        match self.read_word(page)? {
            PAGE_PREAMBLE => Ok(()),
            ERASED_WORD => self.write_preamble(page),
            // a non-preamble page outside the mount path cannot be written to
            _ => Err(self.retire(page)),
        }
    }

    /// Spins the split-phase erase to completion and re-primes the page. Used where blocking
    /// is acceptable: the boot scan and the one-page wrap.
    fn erase_blocking(&mut self, page: u32) -> Result<(), Error> {
        if self.flash.erase_page_begin(page).is_err() {
            return Err(self.retire(page));
        }
        loop {
            match self.flash.erase_page_continue() {
                Ok(true) => break,
                Ok(false) => {}
                Err(_) => return Err(self.retire(page)),
            }
        }
        self.write_preamble(page)
    }

    /// First page after `after` (cyclically) that has not been retired; `after` itself is the
    /// last resort. Errors when every page is dead.
    fn next_usable_page(&self, after: u32) -> Result<u32, Error> {
        let index = (after - self.base) / T::ERASE_SIZE as u32;
        for offset in 1..=self.pages {
            let candidate = self.page_address((index + offset) % self.pages);
            if !self.is_dead(candidate) {
                return Ok(candidate);
            }
        }
        Err(Error::Flash)
    }

    /// Retires a page for the rest of the session; there is no in-session retry.
    fn retire(&mut self, page: u32) -> Error {
        let index = (page - self.base) / T::ERASE_SIZE as u32;
        self.dead |= 1 << index;
        #[cfg(feature = "defmt")]
        warn!("flash fault, retiring page at {:#x}", page);
        Error::Flash
    }

    fn is_dead(&self, page: u32) -> bool {
        let index = (page - self.base) / T::ERASE_SIZE as u32;
        self.dead & (1 << index) != 0
    }

    fn page_state(&mut self, page: u32) -> Result<(PageState, u32), Error> {
        if self.is_dead(page) {
            return Ok((PageState::Dead, 0));
        }
        if self.erasing == Some(page) {
            return Ok((PageState::Erasing, 0));
        }

        match self.read_word(page)? {
            ERASED_WORD => Ok((PageState::Raw, 0)),
            PAGE_PREAMBLE => {
                let page_len = T::ERASE_SIZE as u32;
                let records = match self.scan_page(page)? {
                    Some(cursor) => (cursor - page - PREAMBLE_SIZE) / RECORD_SIZE as u32 + 1,
                    None => 0,
                };
                let used = PREAMBLE_SIZE + records * RECORD_SIZE as u32;
                if used + RECORD_SIZE as u32 > page_len {
                    Ok((PageState::Full, records))
                } else {
                    Ok((PageState::Active, records))
                }
            }
            _ => Ok((PageState::Stale, 0)),
        }
    }
}
