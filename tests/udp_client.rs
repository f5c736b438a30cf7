mod common;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{body, command_code, echo_handler, reply, MockPlc};
use omron_fins_client::{
    Client, ClockTime, CommandCode, EndCodeCategory, ErrorKind, FinsError, MultiReadValue,
    PlcMode, Protocol,
};

#[test]
fn test_write_word_frame() {
    let plc = MockPlc::udp(echo_handler());
    let client = plc.client(Protocol::Udp);

    client.write("DM1001", &[1234]).unwrap();

    let requests = plc.received();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request[0], 0x80);
    assert_eq!(request[4], 1, "DA1");
    assert_eq!(request[7], 10, "SA1");
    assert_eq!(command_code(request), 0x0102);
    assert_eq!(body(request), hex::decode("8203E900000104D2").unwrap());
}

#[test]
fn test_read_words_and_bits() {
    let plc = MockPlc::udp(echo_handler());
    let client = plc.client(Protocol::Udp);

    assert_eq!(client.read("DM100", 4).unwrap(), vec![0, 1, 2, 3]);
    assert_eq!(client.read_bits("CIO0.00", 3).unwrap(), vec![false, true, false]);
    assert!(!client.read_bit("WR10.02").unwrap());

    let requests = plc.received();
    assert_eq!(body(&requests[0]), &[0x82, 0x00, 0x64, 0x00, 0x00, 0x04]);
    assert_eq!(body(&requests[1]), &[0x30, 0x00, 0x00, 0x00, 0x00, 0x03]);
    assert_eq!(body(&requests[2]), &[0x31, 0x00, 0x0A, 0x02, 0x00, 0x01]);
}

#[test]
fn test_read_multiple_preserves_order() {
    let plc = MockPlc::udp(Box::new(|request| {
        assert_eq!(command_code(request), 0x0104);
        let data = [0x82, 0x12, 0x34, 0x30, 0x01, 0xB1, 0xAB, 0xCD];
        vec![reply(request, 0x0000, &data)]
    }));
    let client = plc.client(Protocol::Udp);

    let values = client
        .read_multiple(["DM1000", "CIO100.05", "WR200"])
        .unwrap();
    assert_eq!(
        values,
        vec![
            MultiReadValue::Word(0x1234),
            MultiReadValue::Bit(true),
            MultiReadValue::Word(0xABCD),
        ]
    );

    let request = &plc.received()[0];
    assert_eq!(
        body(request),
        &[0x82, 0x03, 0xE8, 0x00, 0x30, 0x00, 0x64, 0x05, 0xB1, 0x00, 0xC8, 0x00]
    );
}

#[test]
fn test_end_code_becomes_protocol_error() {
    let plc = MockPlc::udp(Box::new(|request| vec![reply(request, 0x1103, &[])]));
    let client = plc.client(Protocol::Udp);

    let err = client.read("DM100", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(err.end_code().map(|c| c.raw()), Some(0x1103));
    assert_eq!(err.end_code_category(), Some(EndCodeCategory::ParameterError));
}

#[test]
fn test_cpu_error_flags_do_not_fail() {
    let plc = MockPlc::udp(Box::new(|request| vec![reply(request, 0x0040, &[0x00, 0x07])]));
    let client = plc.client(Protocol::Udp);
    assert_eq!(client.read("DM0", 1).unwrap(), vec![7]);
}

#[test]
fn test_validation_sends_nothing() {
    let plc = MockPlc::udp(echo_handler());
    let client = plc.client(Protocol::Udp);

    for err in [
        client.read("DM32768", 1).unwrap_err(),
        client.read("CNT100.05", 1).unwrap_err(),
        client.read("DM0", 1000).unwrap_err(),
        client.write("DM0", &[]).unwrap_err(),
        client.transfer("DM0", "CIO1.00", 1).unwrap_err(),
    ] {
        assert!(err.is_validation_error(), "{:?}", err);
    }
    assert!(plc.received().is_empty());
}

#[test]
fn test_out_of_order_replies_reach_their_callers() {
    // Hold the first three requests, then answer them as 3, 1, 2.
    let held = Arc::new(Mutex::new(Vec::new()));
    let plc = MockPlc::udp({
        let held = Arc::clone(&held);
        Box::new(move |request| {
            let mut held = held.lock().unwrap();
            held.push(request.to_vec());
            if held.len() < 3 {
                return Vec::new();
            }
            [2usize, 0, 1]
                .iter()
                .map(|&i| reply(&held[i], 0x0000, &[0x00, i as u8 + 1]))
                .collect()
        })
    });
    let client = plc.client(Protocol::Udp);
    let session = client.session();
    let body = [0x82, 0x00, 0x00, 0x00, 0x00, 0x01];

    let replies: Vec<_> = (0..3)
        .map(|_| {
            session
                .submit(CommandCode::MemoryAreaRead, &body, Duration::from_secs(2))
                .unwrap()
        })
        .collect();

    for (i, pending) in replies.into_iter().enumerate() {
        let sid = pending.sid();
        let response = pending.wait().unwrap();
        assert_eq!(response.header.sid, sid);
        assert_eq!(response.to_words().unwrap(), vec![i as u16 + 1]);
    }
}

#[test]
fn test_concurrent_reads_get_their_own_data() {
    // Reply with the requested word offset so every caller can check it.
    let plc = MockPlc::udp(Box::new(|request| {
        let body = body(request);
        vec![reply(request, 0x0000, &body[1..3])]
    }));
    let client = Arc::new(plc.client(Protocol::Udp));

    let workers: Vec<_> = (0..16u16)
        .map(|worker| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for round in 0..20u16 {
                    let word = worker * 100 + round;
                    let value = client.read(format!("DM{}", word), 1).unwrap();
                    assert_eq!(value, vec![word]);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(client.session().pending_count(), 0);
}

#[test]
fn test_timeout_does_not_disturb_other_requests() {
    // DM9999 is never answered.
    let plc = MockPlc::udp(Box::new(|request| {
        if body(request)[1..3] == 9999u16.to_be_bytes() {
            Vec::new()
        } else {
            vec![reply(request, 0x0000, &[0x00, 0x2A])]
        }
    }));
    let client = Arc::new(plc.client(Protocol::Udp));
    let session = client.session();

    let lost = session
        .submit(
            CommandCode::MemoryAreaRead,
            &[0x82, 0x27, 0x0F, 0x00, 0x00, 0x01],
            Duration::from_millis(200),
        )
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let reader = {
        let client = Arc::clone(&client);
        thread::spawn(move || tx.send(client.read("DM1", 1)).unwrap())
    };

    let started = Instant::now();
    assert!(matches!(lost.wait(), Err(FinsError::Timeout)));
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(rx.recv().unwrap().unwrap(), vec![42]);
    reader.join().unwrap();
    assert_eq!(session.pending_count(), 0);
}

#[test]
fn test_controller_and_clock() {
    let plc = MockPlc::udp(Box::new(|request| {
        let data: Vec<u8> = match command_code(request) {
            0x0601 => vec![0x01, 0x02, 0, 0, 0, 0, 0, 0, 0, 0],
            0x0501 => {
                let mut data = b"CS1G-CPU44H         ".to_vec();
                data.extend_from_slice(b"04.00               ");
                data
            }
            0x0701 => vec![0x24, 0x03, 0x15, 0x14, 0x30, 0x45, 0x05],
            _ => Vec::new(),
        };
        vec![reply(request, 0x0000, &data)]
    }));
    let client = plc.client(Protocol::Udp);

    let status = client.status().unwrap();
    assert!(status.is_running());

    let info = client.controller_data().unwrap();
    assert_eq!(info.model, "CS1G-CPU44H");
    assert_eq!(info.version, "04.00");

    let time = client.read_clock().unwrap();
    assert_eq!(time, ClockTime::new(2024, 3, 15, 14, 30, 45, 5).unwrap());

    client.write_clock(&time).unwrap();
    client.run(PlcMode::Monitor).unwrap();
    client.stop().unwrap();

    let requests = plc.received();
    let codes: Vec<u16> = requests.iter().map(|r| command_code(r)).collect();
    assert_eq!(codes, vec![0x0601, 0x0501, 0x0701, 0x0702, 0x0401, 0x0402]);
    assert_eq!(body(&requests[3]), &[0x24, 0x03, 0x15, 0x14, 0x30, 0x45, 0x05]);
    assert_eq!(body(&requests[4]), &[0xFF, 0xFF, 0x02]);
    assert!(body(&requests[5]).is_empty());
}

#[test]
fn test_typed_helpers() {
    let memory = Arc::new(Mutex::new(vec![0u16; 64]));
    let plc = MockPlc::udp({
        let memory = Arc::clone(&memory);
        Box::new(move |request| {
            let body = body(request);
            let start = usize::from(u16::from_be_bytes([body[1], body[2]]));
            let count = usize::from(u16::from_be_bytes([body[4], body[5]]));
            let mut memory = memory.lock().unwrap();
            let data = match command_code(request) {
                0x0101 => memory[start..start + count]
                    .iter()
                    .flat_map(|w| w.to_be_bytes())
                    .collect(),
                0x0102 => {
                    for (i, chunk) in body[6..].chunks(2).enumerate() {
                        memory[start + i] = u16::from_be_bytes([chunk[0], chunk[1]]);
                    }
                    Vec::new()
                }
                _ => Vec::new(),
            };
            vec![reply(request, 0x0000, &data)]
        })
    });
    let client = plc.client(Protocol::Udp);

    client.write_f32("DM0", 25.5).unwrap();
    assert_eq!(client.read_f32("DM0").unwrap(), 25.5);
    assert_eq!(&memory.lock().unwrap()[..2], &[0x0000u16, 0x41CC][..]);

    client.write_f64("DM4", -0.125).unwrap();
    assert_eq!(client.read_f64("DM4").unwrap(), -0.125);

    client.write_i32("DM10", -123456).unwrap();
    assert_eq!(client.read_i32("DM10").unwrap(), -123456);

    client.write_string("DM20", "PRODUCT-001").unwrap();
    assert_eq!(client.read_string("DM20", 6).unwrap(), "PRODUCT-001");
}

#[test]
fn test_unbounded_timeout_reads() {
    let plc = MockPlc::udp(echo_handler());
    common::init_tracing();
    let client = Client::new(plc.config(Protocol::Udp).with_timeout(Duration::MAX)).unwrap();

    assert_eq!(client.timeout(), Duration::MAX);
    assert_eq!(client.read("DM0", 2).unwrap(), vec![0, 1]);
}

#[test]
fn test_disconnect_unblocks_and_is_idempotent() {
    let plc = MockPlc::udp(Box::new(|_| Vec::new()));
    let client = Arc::new(plc.client(Protocol::Udp));

    let waiter = {
        let client = Arc::clone(&client);
        thread::spawn(move || {
            client
                .session()
                .submit(
                    CommandCode::MemoryAreaRead,
                    &[0x82, 0, 0, 0, 0, 1],
                    Duration::from_secs(10),
                )
                .unwrap()
                .wait()
        })
    };

    while client.session().pending_count() == 0 {
        thread::sleep(Duration::from_millis(5));
    }
    let started = Instant::now();
    client.disconnect();
    client.disconnect();

    let err = waiter.join().unwrap().unwrap_err();
    assert!(err.is_connection_failure());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!client.is_connected());
    assert!(client.read("DM0", 1).unwrap_err().is_connection_failure());
}
