use embedded_storage::nor_flash::NorFlash;

/// Split-phase page erase, in the manner of the nRF NVMC partial-erase API.
///
/// NOR flash erases take orders of magnitude longer than the animation frame budget, so the
/// record store never issues a plain blocking [`NorFlash::erase`] outside of boot. Instead an
/// erase is armed once and then driven forward in bounded increments from idle polls.
pub trait PartialErase: NorFlash {
    /// Arms an erase of the page starting at `page_addr`. No flash work happens until
    /// [`erase_page_continue`](Self::erase_page_continue) is called.
    fn erase_page_begin(&mut self, page_addr: u32) -> Result<(), Self::Error>;

    /// Advances the armed erase by one bounded-duration increment. Returns `Ok(true)` once the
    /// whole page reads erased; the store then owns the page again.
    fn erase_page_continue(&mut self) -> Result<bool, Self::Error>;

    /// Non-blocking check that the most recent write has been committed to the array.
    fn write_done_check(&mut self) -> bool;
}

impl<T: PartialErase> PartialErase for &mut T {
    fn erase_page_begin(&mut self, page_addr: u32) -> Result<(), Self::Error> {
        T::erase_page_begin(self, page_addr)
    }

    fn erase_page_continue(&mut self) -> Result<bool, Self::Error> {
        T::erase_page_continue(self)
    }

    fn write_done_check(&mut self) -> bool {
        T::write_done_check(self)
    }
}

/// See README.md for an example implementation.
pub trait Platform: PartialErase {}

impl<T: PartialErase> Platform for T {}
