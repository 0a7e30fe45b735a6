//! Async/await support for DMX operations.
//!
//! Adds waker-driven `send_async` / `receive_async` / `wait_sent_async` to
//! [`SharedDmx`]. The interrupt glue ([`SharedDmx::on_uart_interrupt`] and
//! [`SharedDmx::on_timer_interrupt`]) wakes the registered futures, and the
//! hardware timer does the waiting for the inter-packet spacing and the RDM
//! response-lost windows, so nothing polls a clock in a loop.
//!
//! Timeouts are the executor's business: wrap `receive_async` in your
//! runtime's timeout combinator when a bounded wait is needed.

use core::future::poll_fn;
use core::task::Poll;

use crate::driver::port::{DmxDriver, PacketInfo, RxClearance, SendClearance};
use crate::error::Result;
use crate::hal::{BusClock, DmxHal};
use crate::sync::SharedDmx;

impl<H: DmxHal, const MAX_PIDS: usize, const PD_SIZE: usize, const QUEUE: usize>
    SharedDmx<H, MAX_PIDS, PD_SIZE, QUEUE>
{
    /// Resolve once the in-flight frame (if any) has been fully accepted.
    pub async fn wait_sent_async(&self) {
        poll_fn(|cx| {
            if self.with(|driver| driver.is_sending()) {
                self.tx_waker.register(cx.waker());
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
        .await;
    }

    /// Send the buffered frame, suspending through the spacing window.
    ///
    /// Same contract as [`send`](Self::send), but the inter-packet spacing
    /// wait suspends on the hardware timer instead of napping on a delay
    /// provider.
    pub async fn send_async(&self, size: usize) -> Result<usize> {
        self.wait_sent_async().await;

        enum Step {
            Go,
            Abort,
            Armed(u64),
        }

        loop {
            let step = self.with(|driver| match driver.send_clearance(size) {
                SendClearance::Abort => Step::Abort,
                SendClearance::After(ready_at) => {
                    let now = driver.hal.now_us();
                    if now >= ready_at {
                        Step::Go
                    } else {
                        driver.arm_spacing_alarm(ready_at - now);
                        Step::Armed(ready_at)
                    }
                }
            });

            match step {
                Step::Abort => return Ok(0),
                Step::Go => break,
                Step::Armed(ready_at) => {
                    poll_fn(|cx| {
                        let now = self.with(|driver| driver.hal.now_us());
                        if now >= ready_at {
                            Poll::Ready(())
                        } else {
                            self.tx_waker.register(cx.waker());
                            Poll::Pending
                        }
                    })
                    .await;
                }
            }
        }

        self.with(|driver| driver.start_send(size))
    }

    /// Receive one frame, suspending until it completes or the RDM
    /// response-lost window closes.
    ///
    /// Same contract as [`receive`](Self::receive), including synchronous
    /// RDM dispatch of requests addressed to this device.
    pub async fn receive_async(&self, packet: &mut PacketInfo) -> Result<usize> {
        self.wait_sent_async().await;

        let deadline = match self.with(DmxDriver::rx_clearance) {
            RxClearance::Expired => {
                *packet = PacketInfo::timed_out();
                return Ok(0);
            }
            RxClearance::Deadline(t) => Some(t),
            RxClearance::Data | RxClearance::Indefinite => None,
        };

        let taken = poll_fn(|cx| {
            if let Some(p) = self.with(DmxDriver::take_packet) {
                return Poll::Ready(Some(p));
            }
            if let Some(t) = deadline {
                let now = self.with(|driver| driver.hal.now_us());
                if now >= t {
                    return Poll::Ready(None);
                }
            }
            self.rx_waker.register(cx.waker());
            Poll::Pending
        })
        .await;

        let Some(frame) = taken else {
            *packet = PacketInfo::timed_out();
            return Ok(0);
        };
        *packet = frame;

        #[cfg(feature = "rdm")]
        if packet.is_rdm && packet.err.is_ok() {
            let response = self.with(|driver| driver.rdm_dispatch(packet.size));
            if let Some(response_size) = response {
                let _ = self.send_async(response_size).await?;
            }
        }

        Ok(packet.size)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::future::Future;
    use core::pin::pin;
    use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    use super::*;
    use crate::driver::config::DmxConfig;
    use crate::hal::EventSet;
    use crate::hal::mock::MockHal;

    type Shared = SharedDmx<MockHal, 24, 320, 16>;

    fn noop_waker() -> Waker {
        fn clone_fn(_: *const ()) -> RawWaker {
            RawWaker::new(core::ptr::null(), &VTABLE)
        }
        fn nop(_: *const ()) {}
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_fn, nop, nop, nop);
        // SAFETY: all vtable entries are no-ops over a null pointer.
        unsafe { Waker::from_raw(RawWaker::new(core::ptr::null(), &VTABLE)) }
    }

    fn installed() -> Shared {
        let shared = SharedDmx::new(MockHal::new());
        shared.install(DmxConfig::new()).unwrap();
        shared
    }

    #[test]
    fn wait_sent_async_ready_when_idle() {
        let shared = installed();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut fut = pin!(shared.wait_sent_async());
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn send_async_arms_spacing_alarm() {
        let shared = installed();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        // a previous unanswered probe forces the 5.8 ms spacing
        shared.with(|driver| {
            driver.write(0, &[0x00, 1, 2]);
            driver.last_slot_ts = 0;
            driver.hal.now = 100;
            driver.last_tx = crate::driver::port::LastTx::DiscRequest;
        });

        let mut fut = pin!(shared.send_async(3));
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        // alarm armed for the remainder of the window
        assert_eq!(shared.with(|driver| driver.hal.timer_alarm), Some((5_700, false)));

        // the alarm fires
        shared.with(|driver| driver.hal.now = 5_900);
        shared.on_timer_interrupt();
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(3)) => {}
            other => panic!("unexpected poll result: {other:?}"),
        }
        assert!(shared.with(|driver| driver.is_sending()));
    }

    #[test]
    fn receive_async_resolves_on_frame() {
        let shared = installed();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut packet = PacketInfo::empty();
        {
            let mut fut = pin!(shared.receive_async(&mut packet));
            assert_eq!(fut.as_mut().poll(&mut cx).is_pending(), true);

            shared.with(|driver| {
                driver.hal.raise(EventSet::RX_BREAK);
                driver.on_uart_event();
                driver.hal.push_rx(&[0x00, 7, 7]);
                driver.hal.raise(EventSet::RX_FIFO_TOUT);
                driver.on_uart_event();
            });

            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(Ok(3)) => {}
                other => panic!("unexpected poll result: {other:?}"),
            }
        }
        assert_eq!(packet.size, 3);
        assert_eq!(packet.sc, 0);
    }
}
