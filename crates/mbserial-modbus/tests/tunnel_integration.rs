// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tunnel cycles against an in-memory register device.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mbserial_modbus::{
    ModbusError, ModbusResult, ModbusTransport, RetryConfig, SerialTunnel, TransportState,
    TunnelConfig, TunnelError,
};
use mbserial_protocol::{Layout, RegisterMap, StatusWord, pack_chars, unpack_chars};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Write {
    Single { address: u16, value: u16 },
    Multiple { address: u16, values: Vec<u16> },
}

struct DeviceState {
    map: RegisterMap,
    link_up: bool,
    rx_queue: VecDeque<u8>,
    tx_room: u8,
    holding: HashMap<u16, u16>,
    reads: Vec<(u16, u16)>,
    writes: Vec<Write>,
    fail_reads: u32,
}

/// Register device that answers like the tunnel firmware would.
#[derive(Clone)]
struct MockRegisterDevice {
    device: Arc<Mutex<DeviceState>>,
    state: TransportState,
}

impl MockRegisterDevice {
    fn new(layout: Layout) -> Self {
        Self {
            device: Arc::new(Mutex::new(DeviceState {
                map: layout.register_map(),
                link_up: true,
                rx_queue: VecDeque::new(),
                tx_room: 0,
                holding: HashMap::new(),
                reads: Vec::new(),
                writes: Vec::new(),
                fail_reads: 0,
            })),
            state: TransportState::Disconnected,
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        f(&mut self.device.lock().unwrap())
    }

    fn queue_rx(&self, data: &[u8]) {
        self.with(|d| d.rx_queue.extend(data));
    }

    fn set_tx_room(&self, room: u8) {
        self.with(|d| d.tx_room = room);
    }

    fn set_link(&self, up: bool) {
        self.with(|d| d.link_up = up);
    }

    fn fail_next_reads(&self, n: u32) {
        self.with(|d| d.fail_reads = n);
    }

    fn writes(&self) -> Vec<Write> {
        self.with(|d| d.writes.clone())
    }

    fn reads(&self) -> Vec<(u16, u16)> {
        self.with(|d| d.reads.clone())
    }
}

#[async_trait]
impl ModbusTransport for MockRegisterDevice {
    async fn connect(&mut self) -> ModbusResult<()> {
        self.state = TransportState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> ModbusResult<()> {
        self.state = TransportState::Disconnected;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn read_holding_registers(&self, address: u16, count: u16) -> ModbusResult<Vec<u16>> {
        let mut d = self.device.lock().unwrap();
        if d.fail_reads > 0 {
            d.fail_reads -= 1;
            return Err(ModbusError::read_timeout(Duration::from_millis(5)));
        }
        d.reads.push((address, count));

        if address == d.map.status.address() {
            let status = StatusWord::default()
                .with_receive_available(d.rx_queue.len().min(127) as u8)
                .with_transmit_available(d.tx_room)
                .with_connected(d.link_up);
            return Ok(vec![status.bits()]);
        }

        if address == d.map.receive_base().address() {
            let take = (count as usize * 2).min(d.rx_queue.len());
            let chars: Vec<u8> = d.rx_queue.drain(..take).collect();
            let mut registers = pack_chars(&chars);
            registers.resize(count as usize, 0);
            return Ok(registers);
        }

        Ok((0..count)
            .map(|i| d.holding.get(&(address + i)).copied().unwrap_or(0))
            .collect())
    }

    async fn write_single_register(&self, address: u16, value: u16) -> ModbusResult<()> {
        let mut d = self.device.lock().unwrap();
        d.holding.insert(address, value);
        d.writes.push(Write::Single { address, value });
        Ok(())
    }

    async fn write_multiple_registers(&self, address: u16, values: &[u16]) -> ModbusResult<()> {
        let mut d = self.device.lock().unwrap();
        for (i, value) in values.iter().enumerate() {
            d.holding.insert(address + i as u16, *value);
        }
        d.writes.push(Write::Multiple {
            address,
            values: values.to_vec(),
        });
        Ok(())
    }

    fn unit_id(&self) -> u8 {
        1
    }

    fn display_name(&self) -> String {
        "mock register device".to_string()
    }
}

fn fast_config(layout: Layout) -> TunnelConfig {
    TunnelConfig::new(layout)
        .with_poll_interval(Duration::from_millis(1))
        .with_retry(RetryConfig::no_retry())
}

async fn tunnel(layout: Layout) -> (SerialTunnel<MockRegisterDevice>, MockRegisterDevice) {
    let device = MockRegisterDevice::new(layout);
    let tunnel = SerialTunnel::new(device.clone(), fast_config(layout)).unwrap();
    tunnel.connect().await.unwrap();
    (tunnel, device)
}

#[tokio::test]
async fn test_receive_reads_from_window_base() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.queue_rx(b"hello");

    let data = tunnel.receive().await.unwrap();
    assert_eq!(data, b"hello");
    // status at address 1000, then three registers from address 1001
    assert_eq!(device.reads(), vec![(1000, 1), (1001, 3)]);

    let data = tunnel.receive().await.unwrap();
    assert!(data.is_empty());
    assert_eq!(device.reads().len(), 3);
    assert_eq!(tunnel.stats().snapshot().chars_received, 5);
}

#[tokio::test]
async fn test_receive_while_link_down_still_drains() {
    let (tunnel, device) = tunnel(Layout::InputOutput).await;
    device.queue_rx(b"tail");
    device.set_link(false);

    assert_eq!(tunnel.receive().await.unwrap(), b"tail");
}

#[tokio::test]
async fn test_receive_full_window() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    let payload: Vec<u8> = (0..127u8).collect();
    device.queue_rx(&payload);

    // 127 characters need 64 registers; the Rx/Tx window only has 63
    let data = tunnel.receive().await.unwrap();
    assert_eq!(data, &payload[..126]);
    assert_eq!(device.reads()[1], (1001, 63));

    assert_eq!(tunnel.receive().await.unwrap(), &payload[126..]);
}

#[tokio::test]
async fn test_transmit_odd_register_count_ends_on_last_register() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.set_tx_room(127);

    assert_eq!(tunnel.transmit(b"abcdef").await.unwrap(), 6);
    // ids 2061..=2063
    assert_eq!(
        device.writes(),
        vec![Write::Multiple {
            address: 2060,
            values: pack_chars(b"abcdef"),
        }]
    );
}

#[tokio::test]
async fn test_transmit_even_register_count_ends_below_last_register() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.set_tx_room(127);

    assert_eq!(tunnel.transmit(b"abcdefgh").await.unwrap(), 8);
    // ids 2059..=2062
    assert_eq!(
        device.writes(),
        vec![Write::Multiple {
            address: 2058,
            values: pack_chars(b"abcdefgh"),
        }]
    );
}

#[tokio::test]
async fn test_transmit_single_register_uses_single_write() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.set_tx_room(127);

    assert_eq!(tunnel.transmit(b"Z").await.unwrap(), 1);
    assert_eq!(
        device.writes(),
        vec![Write::Single {
            address: 2062,
            value: 0x5A00,
        }]
    );
}

#[tokio::test]
async fn test_transmit_limited_by_room() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.set_tx_room(10);

    let sent = tunnel
        .transmit(b"the quick brown fox jumps")
        .await
        .unwrap();
    assert_eq!(sent, 10);
    // 5 registers at ids 2059..=2063
    assert_eq!(
        device.writes(),
        vec![Write::Multiple {
            address: 2058,
            values: pack_chars(b"the quick "),
        }]
    );
}

#[tokio::test]
async fn test_transmit_input_output_layout() {
    let (tunnel, device) = tunnel(Layout::InputOutput).await;
    device.set_tx_room(10);

    assert_eq!(tunnel.transmit(b"abc").await.unwrap(), 3);
    // 2 registers end one below id 2064
    assert_eq!(
        device.writes(),
        vec![Write::Multiple {
            address: 2061,
            values: pack_chars(b"abc"),
        }]
    );
}

#[tokio::test]
async fn test_transmit_suppressed_while_link_down() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.set_tx_room(127);
    device.set_link(false);

    assert_eq!(tunnel.transmit(b"dropped").await.unwrap(), 0);
    assert!(device.writes().is_empty());
    assert_eq!(tunnel.stats().snapshot().suppressed_transmits, 1);
}

#[tokio::test]
async fn test_transmit_all_spans_cycles() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.set_tx_room(10);
    let payload = b"0123456789abcdefghijklmno";

    tunnel.transmit_all(payload).await.unwrap();

    let writes = device.writes();
    assert_eq!(writes.len(), 3);

    let mut delivered = Vec::new();
    for (write, chars) in writes.iter().zip([10usize, 10, 5]) {
        match write {
            Write::Multiple { values, .. } => {
                delivered.extend(unpack_chars(values, chars).unwrap());
            }
            Write::Single { value, .. } => {
                delivered.extend(unpack_chars(&[*value], chars).unwrap());
            }
        }
    }
    assert_eq!(delivered, payload);

    let stats = tunnel.stats().snapshot();
    assert_eq!(stats.chars_sent, 25);
    assert_eq!(stats.transmit_cycles, 3);
}

#[tokio::test]
async fn test_transmit_all_fails_on_link_down() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.set_tx_room(10);
    device.set_link(false);

    let err = tunnel.transmit_all(b"payload").await.unwrap_err();
    assert!(matches!(
        err,
        ModbusError::Tunnel(TunnelError::LinkDown { sent: 0, total: 7 })
    ));
    assert!(device.writes().is_empty());
}

#[tokio::test]
async fn test_transmit_all_stalls_without_room() {
    let device = MockRegisterDevice::new(Layout::RxTx);
    let config = fast_config(Layout::RxTx).with_max_transmit_cycles(3);
    let tunnel = SerialTunnel::new(device.clone(), config).unwrap();

    let err = tunnel.transmit_all(b"stuck").await.unwrap_err();
    assert!(matches!(
        err,
        ModbusError::Tunnel(TunnelError::TransmitStalled { cycles: 3, sent: 0, total: 5 })
    ));
    assert_eq!(tunnel.stats().snapshot().stalled_transmits, 3);
}

#[tokio::test]
async fn test_transmit_byte_register() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.set_tx_room(1);

    assert!(tunnel.transmit_byte(b'!').await.unwrap());
    assert_eq!(device.writes(), vec![Write::Single { address: 2063, value: 0x0021 }]);

    device.set_tx_room(0);
    assert!(!tunnel.transmit_byte(b'?').await.unwrap());
    assert_eq!(device.writes().len(), 1);
}

#[tokio::test]
async fn test_poll_moves_both_directions_on_one_status_read() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.queue_rx(b"ok");
    device.set_tx_room(4);

    let outcome = tunnel.poll(b"ping!").await.unwrap();
    assert_eq!(outcome.received, b"ok");
    assert_eq!(outcome.sent, 4);
    assert!(outcome.status.is_connected());
    assert!(!outcome.is_idle());

    let status_reads = device.reads().iter().filter(|(a, _)| *a == 1000).count();
    assert_eq!(status_reads, 1);
}

#[tokio::test]
async fn test_baud_rate_round_trip() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;

    tunnel.set_baud_rate(115_200).await.unwrap();
    assert_eq!(
        device.writes(),
        vec![Write::Multiple {
            address: 2,
            values: vec![0x0001, 0xC200],
        }]
    );
    assert_eq!(tunnel.baud_rate().await.unwrap(), 115_200);
}

#[tokio::test]
async fn test_baud_rate_unsupported_on_input_output() {
    let (tunnel, device) = tunnel(Layout::InputOutput).await;

    let err = tunnel.set_baud_rate(9600).await.unwrap_err();
    assert!(matches!(err, ModbusError::Tunnel(TunnelError::Unsupported { .. })));
    assert!(device.writes().is_empty());
}

#[tokio::test]
async fn test_transient_read_failures_are_retried() {
    let device = MockRegisterDevice::new(Layout::RxTx);
    let config = fast_config(Layout::RxTx)
        .with_retry(RetryConfig::fixed(3, Duration::from_millis(1)));
    let tunnel = SerialTunnel::new(device.clone(), config).unwrap();
    device.queue_rx(b"hi");
    device.fail_next_reads(2);

    assert_eq!(tunnel.receive().await.unwrap(), b"hi");

    let stats = tunnel.client().stats();
    assert_eq!(stats.retries(), 2);
    assert_eq!(stats.failed_requests(), 2);
}

#[tokio::test]
async fn test_failures_surface_without_retry() {
    let (tunnel, device) = tunnel(Layout::RxTx).await;
    device.fail_next_reads(1);

    let err = tunnel.status().await.unwrap_err();
    assert_eq!(err.category(), "timeout");
    assert!(err.is_retryable());
    assert_eq!(tunnel.client().stats().retries(), 0);
}
