//! Mock construction helpers

use regwatch_rs::MockMemory;

pub const GPIOA_MODER: u32 = 0x4002_0000;
pub const GPIOA_ODR: u32 = 0x4002_0014;
pub const GPIOB_MODER: u32 = 0x4002_0400;
pub const TIM2_CNT: u32 = 0x4000_0024;

/// Mock target with plausible reset values for the GPIO test catalog
pub fn gpio_memory() -> MockMemory {
    MockMemory::new()
        .with_word(GPIOA_MODER, 0xa800_0000)
        .with_word(GPIOA_ODR, 0x0000_0000)
        .with_word(GPIOB_MODER, 0x0000_0280)
        .with_word(TIM2_CNT, 0x0001_e240)
}

/// Mock target holding the given words
pub fn memory_with(words: &[(u32, u32)]) -> MockMemory {
    words
        .iter()
        .fold(MockMemory::new(), |memory, &(address, value)| {
            memory.with_word(address, value)
        })
}
