// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

pub mod delay;
pub mod transport;

#[cfg(target_arch = "arm")]
pub mod dwt;
#[cfg(target_arch = "arm")]
pub mod spi;
#[cfg(target_arch = "arm")]
pub mod usart;

pub use delay::{CancelToken, TickSource};
pub use transport::{IrqSources, Transport};

#[cfg(target_arch = "arm")]
pub use dwt::CycleCounter;
#[cfg(target_arch = "arm")]
pub use spi::{ChipSelect, SpiBus};
#[cfg(target_arch = "arm")]
pub use usart::Usart;
