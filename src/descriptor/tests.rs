// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

use super::*;

const AUDIO_CONTROL_INTERFACE: &[u8] = &[
    9, 0x04, 0, 0, 0, 0x01, 0x01, 0, 0, // standard AC interface
    9, 0x24, 0x01, 0x00, 0x01, 0x09, 0x00, 0x01, 0x01, // class-specific AC header
];

const MIDI_STREAMING_INTERFACE: &[u8] = &[9, 0x04, 1, 0, 2, 0x01, 0x03, 0, 0];

const MS_HEADER: &[u8] = &[7, 0x24, 0x01, 0x00, 0x01, 0x41, 0x00];

const JACKS: &[u8] = &[
    6, 0x24, 0x02, 0x01, 0x01, 0, // embedded IN jack
    6, 0x24, 0x02, 0x02, 0x02, 0, // external IN jack
    9, 0x24, 0x03, 0x01, 0x03, 0x01, 0x02, 0x01, 0, // embedded OUT jack
    9, 0x24, 0x03, 0x02, 0x04, 0x01, 0x01, 0x01, 0, // external OUT jack
];

const OUT_ENDPOINT: &[u8] = &[9, 0x05, 0x01, 0x02, 0x40, 0x00, 0, 0, 0];

const OUT_ENDPOINT_ONE_CABLE: &[u8] = &[5, 0x25, 0x01, 1, 0x01];

const IN_ENDPOINT: &[u8] = &[9, 0x05, 0x82, 0x02, 0x40, 0x00, 0, 0, 0];

const IN_ENDPOINT_TWO_CABLES: &[u8] = &[6, 0x25, 0x01, 2, 0x03, 0x04];

fn concat(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

fn midi_streaming_block() -> Vec<u8> {
    concat(&[
        MIDI_STREAMING_INTERFACE,
        MS_HEADER,
        JACKS,
        OUT_ENDPOINT,
        OUT_ENDPOINT_ONE_CABLE,
        IN_ENDPOINT,
        IN_ENDPOINT_TWO_CABLES,
    ])
}

fn parse(block: &[u8]) -> Result<MidiInterface, EnumerationError> {
    parse_midi_interface(block, &Config::default())
}

#[test]
fn iterate_raw_descriptors() {
    let block = concat(&[MS_HEADER, OUT_ENDPOINT]);
    let mut iter = DescriptorIter::new(&block);
    let header = iter.next().unwrap().unwrap();
    assert_eq!(0, header.offset());
    assert_eq!(7, header.len());
    assert_eq!(DESC_TYPE_CS_INTERFACE, header.descriptor_type());
    assert_eq!(Some(0x01), header.subtype());
    assert_eq!(&MS_HEADER[2..], header.payload());
    assert_eq!(7, iter.consumed());
    let endpoint = iter.next().unwrap().unwrap();
    assert_eq!(7, endpoint.offset());
    assert_eq!(DESC_TYPE_ENDPOINT, endpoint.descriptor_type());
    assert!(iter.next().is_none());
    assert_eq!(block.len(), iter.consumed());
}

#[test]
fn iterator_stops_after_zero_length() {
    let block = [0, 0x24, 0x01];
    let mut iter = DescriptorIter::new(&block);
    assert_eq!(
        Some(Err(EnumerationError::InvalidLength {
            offset: 0,
            length: 0
        })),
        iter.next()
    );
    assert!(iter.next().is_none());
}

#[test]
fn iterator_never_exceeds_block() {
    let block = [7, 0x24, 0x01, 0x00];
    let mut iter = DescriptorIter::new(&block);
    assert_eq!(
        Some(Err(EnumerationError::Truncated {
            offset: 0,
            length: 7,
            available: 4
        })),
        iter.next()
    );
    assert!(iter.next().is_none());
}

#[test]
fn decode_class_specific_endpoint() {
    let raw = DescriptorIter::new(IN_ENDPOINT_TWO_CABLES)
        .next()
        .unwrap()
        .unwrap();
    let descriptor = Descriptor::try_from(raw).unwrap();
    let ms_endpoint = descriptor.into_ms_endpoint().unwrap();
    assert_eq!(vec![0x03, 0x04], ms_endpoint.jack_ids);
    assert_eq!(2, ms_endpoint.num_cables());
}

#[test]
fn accept_midi_streaming_interface() {
    let interface = parse(&midi_streaming_block()).unwrap();
    assert_eq!(1, interface.interface_number);
    assert_eq!(2, interface.num_rx_cables());
    assert_eq!(1, interface.num_tx_cables());
    let rx = interface.rx.unwrap();
    assert_eq!(EndpointAddress::new(0x82), rx.address());
    assert_eq!(64, rx.max_packet_size);
    let tx = interface.tx.unwrap();
    assert_eq!(EndpointAddress::new(0x01), tx.address());
    assert_eq!(64, tx.max_packet_size);
}

#[test]
fn skip_audio_control_interface() {
    let block = concat(&[AUDIO_CONTROL_INTERFACE, midi_streaming_block().as_slice()]);
    let interface = parse(&block).unwrap();
    assert_eq!(1, interface.interface_number);
    assert_eq!(2, interface.num_rx_cables());
    assert_eq!(1, interface.num_tx_cables());
}

#[test]
fn reject_audio_control_without_midi_streaming() {
    assert_eq!(
        Err(EnumerationError::NoMidiStreamingInterface),
        parse(AUDIO_CONTROL_INTERFACE)
    );
}

#[test]
fn reject_wrong_class() {
    let mut block = midi_streaming_block();
    // HID
    block[5] = 0x03;
    assert_eq!(
        Err(EnumerationError::NotAudioClass { class: 0x03 }),
        parse(&block)
    );
}

#[test]
fn reject_audio_streaming() {
    let mut block = midi_streaming_block();
    block[6] = SUBCLASS_AUDIO_STREAMING;
    assert_eq!(
        Err(EnumerationError::NotMidiStreaming {
            subclass: SUBCLASS_AUDIO_STREAMING
        }),
        parse(&block)
    );
}

#[test]
fn reject_class_specific_endpoint_without_endpoint() {
    let block = concat(&[
        MIDI_STREAMING_INTERFACE,
        MS_HEADER,
        IN_ENDPOINT_TWO_CABLES,
        IN_ENDPOINT,
    ]);
    assert_eq!(Err(EnumerationError::OrphanClassEndpoint), parse(&block));
}

#[test]
fn reject_class_specific_endpoint_after_jack() {
    let block = concat(&[
        MIDI_STREAMING_INTERFACE,
        MS_HEADER,
        IN_ENDPOINT,
        JACKS,
        IN_ENDPOINT_TWO_CABLES,
    ]);
    assert_eq!(Err(EnumerationError::OrphanClassEndpoint), parse(&block));
}

#[test]
fn reject_duplicate_endpoint() {
    let block = concat(&[
        MIDI_STREAMING_INTERFACE,
        MS_HEADER,
        IN_ENDPOINT,
        IN_ENDPOINT_TWO_CABLES,
        IN_ENDPOINT,
        IN_ENDPOINT_TWO_CABLES,
    ]);
    assert_eq!(
        Err(EnumerationError::DuplicateEndpoint {
            direction: Direction::In,
            address: EndpointAddress::new(0x82),
        }),
        parse(&block)
    );
}

#[test]
fn reject_unknown_descriptor_type() {
    let block = concat(&[
        MIDI_STREAMING_INTERFACE,
        MS_HEADER,
        &[3, 0x21, 0x00],
        IN_ENDPOINT,
        IN_ENDPOINT_TWO_CABLES,
    ]);
    assert_eq!(
        Err(EnumerationError::UnexpectedDescriptor {
            descriptor_type: 0x21,
            subtype: Some(0x00),
        }),
        parse(&block)
    );
}

#[test]
fn reject_unknown_interface_subtype() {
    let block = concat(&[
        MIDI_STREAMING_INTERFACE,
        MS_HEADER,
        &[4, 0x24, 0x07, 0x00],
        IN_ENDPOINT,
        IN_ENDPOINT_TWO_CABLES,
    ]);
    assert_eq!(
        Err(EnumerationError::UnknownInterfaceSubtype { subtype: 0x07 }),
        parse(&block)
    );
}

#[test]
fn reject_truncated_block() {
    let block = midi_streaming_block();
    assert!(matches!(
        parse(&block[..block.len() - 1]),
        Err(EnumerationError::Truncated { .. })
    ));
}

#[test]
fn reject_interface_without_endpoints() {
    let block = concat(&[MIDI_STREAMING_INTERFACE, MS_HEADER, JACKS]);
    assert_eq!(Err(EnumerationError::NoUsableEndpoint), parse(&block));
}

#[test]
fn reject_zero_max_packet_size() {
    let block = concat(&[
        MIDI_STREAMING_INTERFACE,
        MS_HEADER,
        &[9, 0x05, 0x82, 0x02, 0x00, 0x00, 0, 0, 0],
        IN_ENDPOINT_TWO_CABLES,
    ]);
    assert_eq!(
        Err(EnumerationError::InvalidMaxPacketSize {
            address: EndpointAddress::new(0x82),
            max_packet_size: 0,
        }),
        parse(&block)
    );
}

#[test]
fn ignore_endpoint_without_embedded_jacks() {
    let block = concat(&[
        MIDI_STREAMING_INTERFACE,
        MS_HEADER,
        OUT_ENDPOINT,
        IN_ENDPOINT,
        IN_ENDPOINT_TWO_CABLES,
    ]);
    let interface = parse(&block).unwrap();
    assert!(interface.tx.is_none());
    assert_eq!(0, interface.num_tx_cables());
    assert_eq!(2, interface.num_rx_cables());
}

#[test]
fn clamp_max_packet_size() {
    let block = concat(&[
        MIDI_STREAMING_INTERFACE,
        MS_HEADER,
        &[9, 0x05, 0x82, 0x02, 0x00, 0x02, 0, 0, 0],
        IN_ENDPOINT_TWO_CABLES,
    ]);
    let interface = parse(&block).unwrap();
    let rx = interface.rx.unwrap();
    assert_eq!(512, rx.descriptor.max_packet_size);
    assert_eq!(64, rx.max_packet_size);

    let config = Config {
        rx_endpoint_buffer_size: 1024,
        ..Default::default()
    };
    let interface = parse_midi_interface(&block, &config).unwrap();
    assert_eq!(512, interface.rx.unwrap().max_packet_size);
}

#[test]
fn reject_too_many_cables() {
    let mut cs_endpoint = vec![4 + 17, 0x25, 0x01, 17];
    cs_endpoint.extend(1..=17);
    let block = concat(&[MIDI_STREAMING_INTERFACE, MS_HEADER, IN_ENDPOINT, cs_endpoint.as_slice()]);
    assert_eq!(
        Err(EnumerationError::TooManyCables {
            direction: Direction::In,
            num_cables: 17,
        }),
        parse(&block)
    );
}

#[test]
fn stop_at_next_interface() {
    let block = concat(&[
        midi_streaming_block().as_slice(),
        // Vendor specific interface with an endpoint
        &[9, 0x04, 2, 0, 1, 0xff, 0x00, 0, 0],
        &[7, 0x05, 0x83, 0x02, 0x40, 0x00, 0],
    ]);
    let interface = parse(&block).unwrap();
    assert_eq!(EndpointAddress::new(0x82), interface.rx.unwrap().address());
}

#[test]
fn stop_at_interface_association() {
    let block = concat(&[
        midi_streaming_block().as_slice(),
        // Interface association of a CDC function
        &[8, 0x0b, 2, 2, 0x02, 0x02, 0x00, 0],
        &[9, 0x04, 2, 0, 1, 0x02, 0x02, 0x00, 0],
        &[5, 0x24, 0x00, 0x10, 0x01],
    ]);
    let interface = parse(&block).unwrap();
    assert_eq!(1, interface.interface_number);
    assert_eq!(2, interface.num_rx_cables());
    assert_eq!(1, interface.num_tx_cables());
}
