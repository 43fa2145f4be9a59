#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use lamp_core::platform::{PartialErase, Platform};
use lamp_core::RecordStore;

// 1 word is the minimum that can be written
pub const WORD_SIZE: usize = 4;

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
    EraseBegin { offset: u32 },
    EraseStep { offset: u32 },
}

/// In-memory NOR flash with NVMC-style split-phase page erase.
///
/// Writes AND bits into the buffer (flash can only flip 1 -> 0), erases restore a page to
/// all-ones across `erase_increments` polled steps, and `fail_after_operation` injects driver
/// faults: once the operation log reaches that length, the next `fail_count` operations error.
pub struct Flash<const PAGE_SIZE: usize = 4096> {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    pub fail_count: usize,
    pub operations: Vec<Operation>,
    /// polled steps needed to erase one page
    pub erase_increments: usize,
    /// `write_done_check` polls reporting false after each write
    pub write_confirm_delay: usize,
    erase: Option<EraseJob>,
    pending_confirms: usize,
}

struct EraseJob {
    page: u32,
    cleared: usize,
}

impl<const PAGE_SIZE: usize> Flash<PAGE_SIZE> {
    pub fn new(pages: usize) -> Self {
        Self {
            buf: vec![0xFFu8; PAGE_SIZE * pages],
            fail_after_operation: usize::MAX,
            fail_count: usize::MAX,
            operations: Vec::new(),
            erase_increments: 4,
            write_confirm_delay: 0,
            erase: None,
            pending_confirms: 0,
        }
    }

    pub fn new_with_fault(pages: usize, fail_after_operation: usize, fail_count: usize) -> Self {
        Self {
            fail_after_operation,
            fail_count,
            ..Self::new(pages)
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn word(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.buf[offset..offset + 4].try_into().unwrap())
    }

    pub fn erase_begins(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::EraseBegin { .. }))
            .count()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn faulted(&mut self) -> bool {
        if self.operations.len() >= self.fail_after_operation && self.fail_count > 0 {
            self.fail_count -= 1;
            println!("    flash: FAULT");
            return true;
        }
        false
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl<const PAGE_SIZE: usize> ErrorType for Flash<PAGE_SIZE> {
    type Error = FlashError;
}

impl<const PAGE_SIZE: usize> ReadNorFlash for Flash<PAGE_SIZE> {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));

        println!(
            "    flash: read:  0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        if self.faulted() {
            return Err(FlashError);
        }
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<const PAGE_SIZE: usize> NorFlash for Flash<PAGE_SIZE> {
    const WRITE_SIZE: usize = WORD_SIZE;

    const ERASE_SIZE: usize = PAGE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to > from);

        println!(
            "    flash: erase: {from:04X} - {to:04X} #{:>2}",
            self.operations.len()
        );
        if self.faulted() {
            return Err(FlashError);
        }
        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xFF;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE as _));
        assert!(!bytes.is_empty());

        println!(
            "    flash: write: 0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        if self.faulted() {
            return Err(FlashError);
        }
        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            // flash bits only move from 1 to 0 without an erase
            self.buf[offset + i] &= val;
        }
        self.pending_confirms = self.write_confirm_delay;
        Ok(())
    }
}

impl<const PAGE_SIZE: usize> PartialErase for Flash<PAGE_SIZE> {
    fn erase_page_begin(&mut self, page_addr: u32) -> Result<(), Self::Error> {
        assert!(page_addr.is_multiple_of(PAGE_SIZE as u32));
        assert!(self.erase.is_none(), "erase already armed");

        println!(
            "    flash: erase_begin: 0x{page_addr:04X} #{:>2}",
            self.operations.len()
        );
        if self.faulted() {
            return Err(FlashError);
        }
        self.operations.push(Operation::EraseBegin { offset: page_addr });

        self.erase = Some(EraseJob {
            page: page_addr,
            cleared: 0,
        });
        Ok(())
    }

    fn erase_page_continue(&mut self) -> Result<bool, Self::Error> {
        let (page, cleared) = match &self.erase {
            Some(job) => (job.page, job.cleared),
            None => return Ok(true),
        };

        println!(
            "    flash: erase_step: 0x{page:04X} at {cleared} #{:>2}",
            self.operations.len()
        );
        if self.faulted() {
            return Err(FlashError);
        }
        self.operations.push(Operation::EraseStep { offset: page });

        let end = (cleared + PAGE_SIZE.div_ceil(self.erase_increments)).min(PAGE_SIZE);
        let base = page as usize;
        for byte in &mut self.buf[base + cleared..base + end] {
            *byte = 0xFF;
        }

        if end >= PAGE_SIZE {
            self.erase = None;
            Ok(true)
        } else {
            self.erase = Some(EraseJob { page, cleared: end });
            Ok(false)
        }
    }

    fn write_done_check(&mut self) -> bool {
        if self.pending_confirms > 0 {
            self.pending_confirms -= 1;
            return false;
        }
        true
    }
}

/// Polls the store until all background work is confirmed.
pub fn drain<T: Platform>(store: &mut RecordStore<T>) {
    for _ in 0..64 {
        if !store.is_busy() {
            return;
        }
        store.poll_reclaim().unwrap();
    }
    panic!("store did not go idle");
}
