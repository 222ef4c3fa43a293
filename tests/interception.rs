//! Integration tests for the interception path of an installed proxy.
//!
//! Messages are sent through `Connection::send` exactly as the server would,
//! and the test inspects what reached the original send path.

mod common;

use common::{Harness, VIEWER};
use mcshim::error::{HandlerError, InstallError, TransportError};
use mcshim::intercept::{KindFilter, KindTag, Verdict};
use mcshim::proxy::{ConnectionProxy, ProfileOverride, ProxyDeps, ProxyState};
use mcshim::scheduler::DeferredTaskScheduler;
use mcshim_proto::{
    ItemPayload, ItemStack, OutboundMessage, ProtocolVersion, RosterEntry, RosterUpdate,
    TRADE_LIST_CHANNEL, TradeOffer, TradeOfferList, WireKind,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[test]
fn test_other_forwarded_once_without_dispatch() {
    let mut h = Harness::new(ProtocolVersion::V1_12_R1);
    let calls = counter();
    let seen = Arc::clone(&calls);
    h.registry.register("observer", KindFilter::Any, move |ctx| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(ctx.allow())
    });

    // Keep Alive is never intercepted.
    let msg = OutboundMessage::new(ProtocolVersion::V1_12_R1, 0x1F, &b"\x00\x00\x00\x00\x00\x00\x00\x2A"[..]);
    h.conn.send(msg.clone()).unwrap();

    assert_eq!(h.drain(), vec![msg]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_destroy_entities_not_dispatched() {
    let mut h = Harness::new(ProtocolVersion::V1_8_R3);
    let calls = counter();
    let seen = Arc::clone(&calls);
    h.registry.register("observer", KindFilter::Any, move |ctx| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(ctx.allow())
    });

    let msg = h.acc.destroy_entities(&[1, 2, 3]);
    h.conn.send(msg.clone()).unwrap();
    assert_eq!(h.drain(), vec![msg]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_no_handlers_forwards_original() {
    let mut h = Harness::new(ProtocolVersion::V1_9_R2);
    let msg = h.acc.chat(r#"{"text":"hi"}"#, 0);
    h.conn.send(msg.clone()).unwrap();
    assert_eq!(h.drain(), vec![msg]);
}

#[test]
fn test_suppress_stops_chain() {
    let mut h = Harness::new(ProtocolVersion::V1_12_R1);
    let later = counter();
    let seen = Arc::clone(&later);
    h.registry
        .register("gate", KindFilter::only(KindTag::Chat), |_| Ok(Verdict::Suppress));
    h.registry.register("after", KindFilter::Any, move |ctx| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(ctx.allow())
    });

    h.conn.send(h.acc.chat(r#"{"text":"spam"}"#, 0)).unwrap();
    assert!(h.drain().is_empty());
    assert_eq!(later.load(Ordering::SeqCst), 0);
}

#[test]
fn test_chat_rewrite_keeps_position() {
    for version in ProtocolVersion::ALL {
        let mut h = Harness::new(version);
        h.registry.register("censor", KindFilter::only(KindTag::Chat), |ctx| {
            Ok(ctx.rewrite(|acc, msg| acc.write_plain_text(msg, "[redacted]"))?)
        });

        h.conn.send(h.acc.action_bar("secret")).unwrap();
        let sent = h.drain();
        assert_eq!(sent.len(), 1, "{version}");
        assert_eq!(h.acc.read_plain_text(&sent[0]).unwrap(), "[redacted]");
        assert_eq!(h.acc.read_chat_position(&sent[0]).unwrap(), 2);
    }
}

#[test]
fn test_rewrites_compose_in_registration_order() {
    let mut h = Harness::new(ProtocolVersion::V1_8_R3);
    h.registry.register("first", KindFilter::only(KindTag::Chat), |ctx| {
        let acc = ctx.accessor()?;
        let text = acc.read_plain_text(ctx.message())?;
        Ok(ctx.rewrite(|acc, msg| acc.write_plain_text(msg, &format!("{text}!")))?)
    });
    h.registry.register("second", KindFilter::only(KindTag::Chat), |ctx| {
        let acc = ctx.accessor()?;
        let text = acc.read_plain_text(ctx.message())?;
        Ok(ctx.rewrite(|acc, msg| acc.write_plain_text(msg, &format!("<{text}>")))?)
    });

    h.conn.send(h.acc.chat(r#"{"text":"hey"}"#, 0)).unwrap();
    let sent = h.drain();
    assert_eq!(h.acc.read_plain_text(&sent[0]).unwrap(), "<hey!>");
}

#[test]
fn test_unregistered_handler_not_invoked() {
    let mut h = Harness::new(ProtocolVersion::V1_12_R1);
    let calls = counter();
    let seen = Arc::clone(&calls);
    let handle = h.registry.register("plugin", KindFilter::only(KindTag::Chat), move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(Verdict::Suppress)
    });

    assert!(h.registry.unregister(&handle));
    assert!(!h.registry.unregister(&handle));

    let msg = h.acc.chat(r#"{"text":"hi"}"#, 0);
    h.conn.send(msg.clone()).unwrap();
    assert_eq!(h.drain(), vec![msg]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_suppress_empty_slot_updates() {
    for version in ProtocolVersion::ALL {
        let mut h = Harness::new(version);
        h.registry.register("hide-empty", KindFilter::only(KindTag::SetSlot), |ctx| {
            let update = ctx.accessor()?.read_slot_stack(ctx.message())?;
            if update.item.is_empty() {
                Ok(Verdict::Suppress)
            } else {
                Ok(ctx.allow())
            }
        });

        h.conn.send(h.set_slot(36, ItemPayload::Empty)).unwrap();
        assert!(h.drain().is_empty(), "{version}");

        let full = h.set_slot(36, ItemStack::new(276, 1).into());
        h.conn.send(full.clone()).unwrap();
        assert_eq!(h.drain(), vec![full], "{version}");
    }
}

#[test]
fn test_trade_price_rewrite() {
    let mut h = Harness::new(ProtocolVersion::V1_12_R1);
    h.registry.register(
        "discount",
        KindFilter::channel(TRADE_LIST_CHANNEL),
        |ctx| {
            Ok(ctx.rewrite(|acc, msg| {
                let mut list = acc.read_trade_offers(msg)?;
                for offer in &mut list.offers {
                    offer.set_price(1);
                }
                acc.write_trade_offers(msg, &list)
            })?)
        },
    );

    let list = TradeOfferList {
        window_id: 3,
        offers: vec![TradeOffer {
            first_input: ItemStack::new(388, 24).into(),
            output: ItemStack::new(403, 1).into(),
            second_input: Some(ItemStack::new(340, 1).into()),
            disabled: false,
            uses: 0,
            max_uses: 7,
        }],
        trailing: bytes::Bytes::from_static(b"\x00\x7Ftail"),
    };
    h.conn
        .send(h.plugin_message(TRADE_LIST_CHANNEL, &list.encode()))
        .unwrap();

    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    let decoded = h.acc.read_trade_offers(&sent[0]).unwrap();
    assert_eq!(decoded.offers[0].price(), 1);
    assert_eq!(decoded.offers[0].second_input, list.offers[0].second_input);
    assert_eq!(decoded.trailing, list.trailing);
}

#[test]
fn test_unknown_channel_forwarded_untouched() {
    let mut h = Harness::new(ProtocolVersion::V1_9_R2);
    let calls = counter();
    let seen = Arc::clone(&calls);
    h.registry.register("observer", KindFilter::Any, move |ctx| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(ctx.allow())
    });

    let msg = h.plugin_message("MC|Brand", b"\x07vanilla");
    h.conn.send(msg.clone()).unwrap();
    assert_eq!(h.drain(), vec![msg]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_undecodable_trade_list_skips_dispatch() {
    let mut h = Harness::new(ProtocolVersion::V1_8_R3);
    let calls = counter();
    let seen = Arc::clone(&calls);
    h.registry
        .register("discount", KindFilter::channel(TRADE_LIST_CHANNEL), move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict::Suppress)
        });

    // Declares one offer but carries none.
    let msg = h.plugin_message(TRADE_LIST_CHANNEL, &[0, 0, 0, 1, 1]);
    h.conn.send(msg.clone()).unwrap();
    assert_eq!(h.drain(), vec![msg]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_failing_handlers_fail_open() {
    let mut h = Harness::new(ProtocolVersion::V1_12_R1);
    h.registry.register("broken", KindFilter::only(KindTag::Chat), |_| {
        Err(HandlerError::Failed("database offline".into()))
    });
    h.registry
        .register("panicky", KindFilter::only(KindTag::Chat), |_| panic!("boom"));

    let msg = h.acc.chat(r#"{"text":"still here"}"#, 0);
    h.conn.send(msg.clone()).unwrap();
    assert_eq!(h.drain(), vec![msg]);
    assert!(!h.conn.is_closed());
}

#[test]
fn test_oversized_rewrite_forwards_original() {
    let mut h = Harness::new(ProtocolVersion::V1_8_R3);
    h.registry.register("shout", KindFilter::only(KindTag::Chat), |ctx| {
        Ok(ctx.rewrite(|acc, msg| acc.write_plain_text(msg, &"A".repeat(40_000)))?)
    });

    let msg = h.acc.chat(r#"{"text":"quiet"}"#, 0);
    h.conn.send(msg.clone()).unwrap();
    let sent = h.drain();
    assert_eq!(sent, vec![msg]);
    assert_eq!(h.acc.read_plain_text(&sent[0]).unwrap(), "quiet");
}

#[test]
fn test_handler_sees_connection_identity() {
    let mut h = Harness::new(ProtocolVersion::V1_9_R2);
    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    h.registry.register("who", KindFilter::only(KindTag::Chat), move |ctx| {
        *slot.lock() = Some((ctx.connection().player_uuid, ctx.kind().clone()));
        Ok(ctx.allow())
    });

    h.conn.send(h.acc.chat(r#"{"text":"x"}"#, 0)).unwrap();
    h.drain();
    let (uuid, kind) = seen.lock().clone().unwrap();
    assert_eq!(uuid, VIEWER);
    assert_eq!(kind.tag(), KindTag::Chat);
}

#[test]
fn test_hidden_spawn_suppressed() {
    let mut h = Harness::new(ProtocolVersion::V1_12_R1);
    let calls = counter();
    let seen = Arc::clone(&calls);
    h.registry
        .register("spawns", KindFilter::only(KindTag::EntitySpawn), move |ctx| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(ctx.allow())
        });

    h.entities.hide(VIEWER, 99);
    h.conn.send(h.spawn_player(99, Uuid::from_u128(1))).unwrap();
    assert!(h.drain().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let visible = h.spawn_player(100, Uuid::from_u128(2));
    h.conn.send(visible.clone()).unwrap();
    assert_eq!(h.drain(), vec![visible]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_profile_override_renames_roster_entry() {
    let mut h = Harness::new(ProtocolVersion::V1_9_R2);
    let target = Uuid::from_u128(0xD15C);
    h.profiles.set(
        target,
        ProfileOverride {
            name: Some("Herobrine".into()),
            ..Default::default()
        },
    );

    h.conn
        .send(h.acc.roster_add(vec![
            RosterEntry::new(target, "Steve"),
            RosterEntry::new(Uuid::from_u128(2), "Alex"),
        ]))
        .unwrap();

    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    let RosterUpdate::Add(entries) = h.acc.read_roster(&sent[0]).unwrap() else {
        panic!("expected an add action");
    };
    assert_eq!(entries[0].name, "Herobrine");
    assert_eq!(entries[1].name, "Alex");
}

#[test]
fn test_send_queue_full_propagates() {
    let h = Harness::with_queue(ProtocolVersion::V1_8_R3, 1);
    h.conn.send(h.acc.chat(r#"{"text":"1"}"#, 0)).unwrap();
    assert_eq!(
        h.conn.send(h.acc.chat(r#"{"text":"2"}"#, 0)),
        Err(TransportError::SendQueueFull)
    );
}

#[test]
fn test_double_install_rejected() {
    let h = Harness::new(ProtocolVersion::V1_12_R1);
    let (scheduler, _driver) = DeferredTaskScheduler::new();
    let again = ConnectionProxy::install(&h.conn, ProxyDeps::new(Arc::clone(&h.registry), scheduler));
    assert!(matches!(again, Err(InstallError::AlreadyInstalled)));
    assert!(Arc::ptr_eq(h.conn.proxy().unwrap(), &h.proxy));
}

#[test]
fn test_disconnect_closes_proxy() {
    let h = Harness::new(ProtocolVersion::V1_12_R1);
    assert_eq!(h.conn.proxy_state(), ProxyState::Installed);
    h.conn.disconnect();
    h.conn.disconnect();
    assert_eq!(h.conn.proxy_state(), ProxyState::Closed);
    assert!(h.proxy.is_closed());
}

#[test]
fn test_window_items_dispatched_per_version() {
    for version in ProtocolVersion::ALL {
        let mut h = Harness::new(version);
        let calls = counter();
        let seen = Arc::clone(&calls);
        h.registry
            .register("windows", KindFilter::only(KindTag::WindowItems), move |ctx| {
                let contents = ctx.accessor()?.read_window_contents(ctx.message())?;
                if contents.items.len() == 2 {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
                Ok(ctx.allow())
            });

        let mut body = bytes::BytesMut::new();
        bytes::BufMut::put_u8(&mut body, 0);
        bytes::BufMut::put_i16(&mut body, 2);
        ItemPayload::Empty.write(&mut body);
        ItemPayload::from(ItemStack::new(1, 64)).write(&mut body);
        let msg = OutboundMessage::new(version, h.id_of(WireKind::WindowItems), body.freeze());
        h.conn.send(msg.clone()).unwrap();
        assert_eq!(h.drain(), vec![msg], "{version}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
