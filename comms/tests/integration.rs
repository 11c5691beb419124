use std::collections::HashMap;

use comms::msg::{AttrValue, Attribute, HyperUpdate, Instruction, Reply, Setup};
use tokio::io;

#[tokio::test]
async fn send_recv_setup_and_instructions() {
    const SIZE: usize = 1024;

    let (one, two) = io::duplex(SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);
    let (rx2, tx2) = io::split(two);
    let (mut rx, _) = comms::channel(rx2, tx2);

    let setup = Setup {
        device: Some("cpu:0".into()),
        start: 2,
        end: 5,
    };
    tx.send(&setup).await.unwrap();
    let got: Setup = rx.recv().await.unwrap();
    assert_eq!(got, setup);

    let get = Instruction::Get {
        indices: vec![4, 2],
        attrs: vec![Attribute::StepNum, Attribute::Accuracy],
    };
    tx.send(&get).await.unwrap();
    let got: Instruction = rx.recv().await.unwrap();
    assert_eq!(got, get);

    let ctg = Instruction::CopyTrainGet {
        indices: vec![2, 3, 4],
        attrs: vec![Attribute::Value],
        replacements: HashMap::from([(3, vec![1u8, 2, 3, 4])]),
    };
    tx.send(&ctg).await.unwrap();
    let got: Instruction = rx.recv().await.unwrap();
    assert_eq!(got, ctg);
}

#[tokio::test]
async fn send_recv_reply_preserves_attr_order() {
    let (one, two) = io::duplex(1024);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);
    let (rx2, tx2) = io::split(two);
    let (mut rx, _) = comms::channel(rx2, tx2);

    let reply: Reply = HashMap::from([(
        7,
        vec![
            AttrValue::StepNum(3),
            AttrValue::UpdateHistory(vec![HyperUpdate {
                step: 2,
                detail: "lr 0.1 -> 0.08".into(),
            }]),
            AttrValue::Accuracy(0.5),
        ],
    )]);
    tx.send(&reply).await.unwrap();
    let got: Reply = rx.recv().await.unwrap();
    assert_eq!(got, reply);

    let values = &got[&7];
    assert_eq!(values[0].step_num(), Some(3));
    assert_eq!(values[2].accuracy(), Some(0.5));
}

#[tokio::test]
async fn recv_on_closed_channel_fails() {
    let (one, two) = io::duplex(64);
    let (rx, tx) = io::split(one);
    let (mut rx, _tx) = comms::channel(rx, tx);
    drop(two);

    let res: std::io::Result<Setup> = rx.recv().await;
    assert!(res.is_err());
}

#[tokio::test]
async fn back_to_back_frames_stay_delimited() {
    let (one, two) = io::duplex(4096);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);
    let (rx2, tx2) = io::split(two);
    let (mut rx, _) = comms::channel(rx2, tx2);

    for num in 0..10usize {
        let get = Instruction::Get {
            indices: vec![num],
            attrs: vec![Attribute::Value],
        };
        tx.send(&get).await.unwrap();
    }

    for num in 0..10usize {
        let got: Instruction = rx.recv().await.unwrap();
        let Instruction::Get { indices, .. } = got else {
            panic!("unexpected instruction");
        };
        assert_eq!(indices, vec![num]);
    }
}
