use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::info;

use crate::engine::{BotState, GameError};
use crate::models::{BetAmount, ChatEvent};
use crate::storage::Dirty;

/// What one inbound chat message asks for.
///
/// Classification precedence, first match wins:
/// exact informational commands, then item use, then (while a round is
/// open) bet commands whose first `!`-token is all digits, then any other
/// `!`-prefixed text as a purchase, then plain chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Points,
    ShopList,
    Inventory,
    BettingInfo,
    UseItem(String),
    Bet {
        option_token: String,
        amount_token: Option<String>,
    },
    Purchase(String),
    Plain,
}

/// Classify one message. `betting_open` routes digit commands to the
/// betting engine only while bets are actually being accepted.
pub fn classify(text: &str, betting_open: bool) -> ChatCommand {
    let text = text.trim();

    match text {
        "!포인트" => return ChatCommand::Points,
        "!상점" => return ChatCommand::ShopList,
        "!아이템" => return ChatCommand::Inventory,
        "!배팅" => return ChatCommand::BettingInfo,
        _ => {}
    }

    if let Some(rest) = text.strip_prefix("!사용 ") {
        return ChatCommand::UseItem(rest.trim().to_string());
    }

    let Some(rest) = text.strip_prefix('!') else {
        return ChatCommand::Plain;
    };

    if betting_open {
        let mut parts = rest.split_whitespace();
        if let Some(first) = parts.next() {
            if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
                return ChatCommand::Bet {
                    option_token: first.to_string(),
                    amount_token: parts.next().map(|s| s.to_string()),
                };
            }
        }
    }

    ChatCommand::Purchase(rest.trim().to_string())
}

/// Route one chat message and produce the chat replies plus the set of
/// documents to persist. Replies come from the owning component's handler;
/// every rejection leaves state untouched.
pub fn handle_chat_event<R: Rng>(
    state: &mut BotState,
    event: &ChatEvent,
    now: DateTime<Utc>,
    rng: &mut R,
) -> (Vec<String>, Dirty) {
    let user = event.sender_id.as_str();
    let name = event.display_name.as_str();
    let mut replies = Vec::new();
    let mut dirty = Dirty::default();

    match classify(&event.text, state.betting.is_open()) {
        ChatCommand::Points => {
            if state.ledger.contains(user) {
                let points = state.ledger.balance(user);
                replies.push(format!("@{name} 님의 현재 포인트: {points}점"));
                info!("{name} checked points: {points}");
            } else {
                replies.push(format!("@{name} 님은 아직 포인트가 없습니다."));
            }
        }

        ChatCommand::ShopList => {
            if state.shop.items().is_empty() {
                replies.push("🛒 현재 상점에 아이템이 없습니다.".to_string());
            } else {
                replies.push("🛒 포인트 상점 아이템 목록 🛒".to_string());
                for item in state.shop.items() {
                    replies.push(format!(
                        "[{}] - {}포인트 : {}",
                        item.name, item.price, item.description
                    ));
                }
                replies.push("🛒 '!아이템이름'으로 아이템을 구매할 수 있습니다. 🛒".to_string());
                info!("{name} listed the shop");
            }
        }

        ChatCommand::Inventory => {
            let owned = state.shop.inventory_of(user);
            if owned.is_empty() {
                replies.push(format!("@{name} 님은 보유한 아이템이 없습니다."));
            } else {
                replies.push(format!("🎒 @{name} 님의 보유 아이템 목록 🎒"));
                for (item_name, quantity) in owned {
                    replies.push(format!("[{item_name}] - {quantity}개"));
                }
                info!("{name} listed their inventory");
            }
        }

        ChatCommand::BettingInfo => {
            // Always answered, even with betting announcements muted
            let snapshot = state.betting.snapshot(now);
            if !snapshot.active {
                replies.push("🎲 현재 진행 중인 배팅이 없습니다.".to_string());
            } else {
                replies.push(format!(
                    "🎲 배팅 주제: {} 🎲",
                    snapshot.topic.as_deref().unwrap_or_default()
                ));
                replies.push("📊 현재 배팅 옵션:".to_string());
                for option in &snapshot.options {
                    replies.push(format!(
                        "[{}] {} - {}포인트 ({}명 참여)",
                        option.idx, option.name, option.bets, option.participants
                    ));
                }
                replies.push(
                    "💰 배팅 방법: !숫자 포인트 (예: !1 포인트 - 1번에 포인트/올인 배팅)"
                        .to_string(),
                );
                info!("{name} checked the betting status");
            }
        }

        ChatCommand::UseItem(query) => match state.shop.use_item(user, name, &query, now) {
            Ok(item_name) => {
                replies.push(format!("🎮 @{name} 님이 '{item_name}' 아이템을 사용하였습니다!"));
                info!("{name} used item '{item_name}'");
                dirty.inventory = true;
            }
            Err(GameError::NotOwned(query)) => {
                replies.push(format!(
                    "@{name} 님이 '{query}' 아이템을 보유하고 있지 않습니다."
                ));
            }
            Err(err) => replies.push(format!("@{name} 님, 아이템 사용에 실패했습니다. ({err})")),
        },

        ChatCommand::Bet {
            option_token,
            amount_token,
        } => {
            handle_bet(state, user, name, &option_token, amount_token.as_deref(), now, &mut replies, &mut dirty);
        }

        ChatCommand::Purchase(query) => {
            if !state.ledger.contains(user) {
                replies.push(format!(
                    "@{name} 님은 포인트가 없습니다. 채팅을 통해 포인트를 모아보세요!"
                ));
            } else {
                match state.shop.purchase(user, &query, &mut state.ledger, now) {
                    Ok(receipt) => {
                        replies.push(format!(
                            "🎉 @{name} 님이 '{}'을(를) 구매했습니다! (남은 포인트: {}점)",
                            receipt.item_name, receipt.balance
                        ));
                        info!(
                            "{name} bought '{}' for {} points",
                            receipt.item_name, receipt.price
                        );
                        dirty.users = true;
                        dirty.inventory = true;
                    }
                    Err(GameError::ItemNotFound(query)) => {
                        replies.push(format!(
                            "@{name} 님, 상점에서 '{query}' 아이템을 찾을 수 없습니다."
                        ));
                    }
                    Err(GameError::InsufficientFunds { have, need }) => {
                        replies.push(format!(
                            "@{name} 님, 아이템을 구매하기 위한 포인트가 부족합니다. (보유: {have}점, 필요: {need}점)"
                        ));
                    }
                    Err(err) => {
                        replies.push(format!("@{name} 님, 구매에 실패했습니다. ({err})"));
                    }
                }
            }
        }

        ChatCommand::Plain => {
            if let Some(grant) = state
                .ledger
                .grant_chat_reward(user, now, &state.settings, rng)
            {
                if state.settings.show_point_messages {
                    if grant.jackpot {
                        replies.push(format!(
                            "🎉 {name}님 축하합니다! 잭팟 {}포인트를 획득하셨습니다!",
                            grant.amount
                        ));
                    } else {
                        replies.push(format!("✨ {name}님이 {}포인트를 획득했습니다!", grant.amount));
                    }
                }
                info!(
                    "Granted {} points to {name} (balance {})",
                    grant.amount, grant.balance
                );
                dirty.users = true;
            }
        }
    }

    (replies, dirty)
}

fn handle_bet(
    state: &mut BotState,
    user: &str,
    name: &str,
    option_token: &str,
    amount_token: Option<&str>,
    now: DateTime<Utc>,
    replies: &mut Vec<String>,
    dirty: &mut Dirty,
) {
    // Validate the command shape before dispatching to the engine
    let Some(amount_token) = amount_token else {
        replies.push(format!(
            "@{name} 님, 배팅 형식이 잘못되었습니다. !숫자 포인트 형식으로 배팅해주세요. (예: !1 500)"
        ));
        return;
    };

    let option_no: usize = option_token.parse().unwrap_or(usize::MAX);

    let amount = if amount_token == "올인" || amount_token.eq_ignore_ascii_case("all-in") {
        BetAmount::AllIn
    } else {
        match amount_token.parse::<i64>() {
            Ok(points) => BetAmount::Points(points),
            Err(_) => {
                replies.push(format!("@{name} 님, 유효한 포인트 수량을 입력해주세요."));
                return;
            }
        }
    };

    match state
        .betting
        .place_bet(user, option_no, amount, &mut state.ledger, now)
    {
        Ok(receipt) => {
            if state.settings.show_betting_messages {
                replies.push(format!(
                    "💰 @{name} 님이 '{}'에 {}포인트를 배팅했습니다! (남은 포인트: {}점)",
                    receipt.option_name, receipt.amount, receipt.balance
                ));
            }
            info!(
                "{name} bet {} points on '{}'",
                receipt.amount, receipt.option_name
            );
            dirty.users = true;
        }
        Err(GameError::NoActiveRound) => {
            replies.push(format!("@{name} 님, 현재 진행 중인 배팅이 없습니다."));
        }
        Err(GameError::BettingClosed) => {
            replies.push(format!("@{name} 님, 배팅이 마감되었습니다."));
        }
        Err(GameError::DuplicateBet) => {
            replies.push(format!(
                "@{name} 님, 이미 배팅에 참여하셨습니다. 중복 배팅은 불가능합니다."
            ));
        }
        Err(GameError::InvalidOption { max }) => {
            replies.push(format!(
                "@{name} 님, 유효하지 않은 선택지입니다. 1~{max} 사이의 번호를 입력해주세요."
            ));
        }
        Err(GameError::NoFunds) => {
            replies.push(format!("@{name} 님, 배팅할 포인트가 없습니다."));
        }
        Err(GameError::BelowMinimum { min }) => {
            replies.push(format!("@{name} 님, 최소 배팅 금액은 {min}포인트입니다."));
        }
        Err(GameError::InsufficientFunds { have, need }) => {
            replies.push(format!(
                "@{name} 님, 보유 포인트가 부족합니다. (보유: {have}점, 필요: {need}점)"
            ));
        }
        Err(err) => {
            replies.push(format!("@{name} 님, 배팅 처리에 실패했습니다. ({err})"));
        }
    }
}

/// Operator actions, dispatched from the admin endpoints
#[derive(Debug, Clone)]
pub enum OperatorCommand {
    StartRound {
        topic: String,
        options: Vec<String>,
        duration_minutes: i64,
    },
    CloseRound,
    SettleRound {
        winning_option: usize,
    },
    AddItem {
        name: String,
        price: i64,
        description: String,
    },
    UpdateItem {
        id: String,
        name: String,
        price: i64,
        description: String,
    },
    DeleteItem {
        id: String,
    },
    SetMultiplier {
        multiplier: f64,
    },
    SetPoints {
        user: String,
        points: i64,
    },
    DeleteUser {
        user: String,
    },
    ResetPoints,
}

/// Dispatch one operator action; returns chat announcements and the
/// documents to persist, or the rejection to report back over HTTP.
pub fn dispatch_operator(
    state: &mut BotState,
    command: OperatorCommand,
    now: DateTime<Utc>,
) -> Result<(Vec<String>, Dirty), GameError> {
    let mut replies = Vec::new();
    let mut dirty = Dirty::default();
    let announce_betting = state.settings.show_betting_messages;

    match command {
        OperatorCommand::StartRound {
            topic,
            options,
            duration_minutes,
        } => {
            let round = state
                .betting
                .start_round(&topic, options, duration_minutes, now)?;

            info!(
                "Betting round started: {} ({} options, {} min)",
                round.topic,
                round.options.len(),
                duration_minutes
            );
            if announce_betting {
                replies.push("🎲 배팅 이벤트가 시작되었습니다! 🎲".to_string());
                replies.push(format!("📢 주제: {}", round.topic));
                replies.push("📊 배팅 선택지:".to_string());
                for (idx, option) in round.options.iter().enumerate() {
                    replies.push(format!("[{}] {option}", idx + 1));
                }
                replies.push(
                    "💰 배팅 방법: !숫자 포인트 (예: !1 포인트 - 1번에 포인트/올인 배팅)"
                        .to_string(),
                );
            }
        }

        OperatorCommand::CloseRound => {
            let round = state.betting.close_round()?;
            info!("Betting round closed: {}", round.topic);
            if announce_betting {
                replies.push("🚨 배팅이 마감되었습니다! 🚨".to_string());
            }
        }

        OperatorCommand::SettleRound { winning_option } => {
            let outcome = state
                .betting
                .settle(winning_option, &mut state.ledger, now)?;
            let record = &outcome.record;

            info!(
                "Betting round settled: {} -> '{}' (pool {}, odds {:.2}, {} winners)",
                record.topic,
                record.winning_option,
                record.total_pool,
                record.odds,
                record.winners.len()
            );
            if announce_betting {
                replies.push("🎉 배팅 결과가 발표되었습니다! 🎉".to_string());
                replies.push(format!(
                    "📢 당첨 선택지: [{}] {}",
                    record.winning_option_idx + 1,
                    record.winning_option
                ));
                replies.push(format!("💰 배당률: {:.2}배", record.odds));
                if record.winners.is_empty() {
                    replies.push("😢 당첨자가 없습니다.".to_string());
                } else {
                    replies.push(format!("🏆 당첨자: {}명", record.winners.len()));
                }
            }
            dirty.users = true;
            dirty.history = true;
        }

        OperatorCommand::AddItem {
            name,
            price,
            description,
        } => {
            let item = state.shop.add_item(&name, price, &description, now)?;
            info!("Shop item added: {} ({} points)", item.name, item.price);
            dirty.shop = true;
        }

        OperatorCommand::UpdateItem {
            id,
            name,
            price,
            description,
        } => {
            state.shop.update_item(&id, &name, price, &description)?;
            info!("Shop item updated: {id}");
            dirty.shop = true;
        }

        OperatorCommand::DeleteItem { id } => {
            let affected = state.shop.delete_item(&id)?;
            info!("Shop item deleted: {id} (removed from {affected} inventories)");
            dirty.shop = true;
            dirty.inventory = true;
        }

        OperatorCommand::SetMultiplier { multiplier } => {
            if !(multiplier > 0.0) {
                return Err(GameError::Validation(
                    "multiplier must be positive".to_string(),
                ));
            }

            state.settings.point_multiplier = multiplier;
            if multiplier != 1.0 {
                info!("Point event started: x{multiplier}");
                replies.push(format!(
                    "🎮 포인트 이벤트 시작! 모든 포인트가 {multiplier}배로 지급됩니다! 🎮"
                ));
            } else {
                info!("Point event ended");
                replies.push("🎮 포인트 이벤트가 종료되었습니다. 🎮".to_string());
            }
            dirty.settings = true;
        }

        OperatorCommand::SetPoints { user, points } => {
            if !state.ledger.contains(&user) {
                return Err(GameError::UserNotFound(user));
            }
            state.ledger.set_balance(&user, points);
            info!("Balance of {user} set to {points}");
            dirty.users = true;
        }

        OperatorCommand::DeleteUser { user } => {
            if !state.ledger.remove_user(&user) {
                return Err(GameError::UserNotFound(user));
            }
            info!("User {user} deleted");
            dirty.users = true;
            dirty.inventory = true;
        }

        OperatorCommand::ResetPoints => {
            state.ledger.reset_all();
            info!("All balances reset");
            dirty.users = true;
        }
    }

    Ok((replies, dirty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::config::Settings;

    fn state() -> BotState {
        BotState::new(
            Settings::default(),
            Default::default(),
            Default::default(),
            Default::default(),
            Default::default(),
        )
    }

    fn event(text: &str) -> ChatEvent {
        ChatEvent {
            sender_id: "user1".to_string(),
            display_name: "user1".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_classify_exact_commands_first() {
        assert_eq!(classify("!포인트", true), ChatCommand::Points);
        assert_eq!(classify("!상점", false), ChatCommand::ShopList);
        assert_eq!(classify("!아이템", false), ChatCommand::Inventory);
        assert_eq!(classify("!배팅", true), ChatCommand::BettingInfo);
    }

    #[test]
    fn test_classify_use_command() {
        assert_eq!(
            classify("!사용 물약", false),
            ChatCommand::UseItem("물약".to_string())
        );
        // No space after the keyword: it is a purchase query instead
        assert_eq!(
            classify("!사용", false),
            ChatCommand::Purchase("사용".to_string())
        );
    }

    #[test]
    fn test_classify_bet_only_while_open() {
        assert_eq!(
            classify("!1 500", true),
            ChatCommand::Bet {
                option_token: "1".to_string(),
                amount_token: Some("500".to_string()),
            }
        );
        assert_eq!(
            classify("!1 500", false),
            ChatCommand::Purchase("1 500".to_string())
        );

        // First token not all digits: purchase even while open
        assert_eq!(
            classify("!1번 500", true),
            ChatCommand::Purchase("1번 500".to_string())
        );

        // Missing amount still routes to the bet handler for validation
        assert_eq!(
            classify("!2", true),
            ChatCommand::Bet {
                option_token: "2".to_string(),
                amount_token: None,
            }
        );
    }

    #[test]
    fn test_classify_plain_chat() {
        assert_eq!(classify("안녕하세요", false), ChatCommand::Plain);
        assert_eq!(classify("  hello  ", true), ChatCommand::Plain);
        assert_eq!(classify("!", false), ChatCommand::Purchase(String::new()));
    }

    #[test]
    fn test_all_in_with_no_points_is_rejected() {
        let mut state = state();
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        state
            .betting
            .start_round("t", vec!["A".into(), "B".into()], 5, now)
            .unwrap();

        let (replies, dirty) = handle_chat_event(&mut state, &event("!1 올인"), now, &mut rng);

        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("배팅할 포인트가 없습니다"));
        assert!(!dirty.any());
        assert!(state.betting.round().unwrap().bets.is_empty());
    }

    #[test]
    fn test_malformed_bet_gets_format_reply() {
        let mut state = state();
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        state.ledger.credit("user1", 100);
        state
            .betting
            .start_round("t", vec!["A".into(), "B".into()], 5, now)
            .unwrap();

        let (replies, _) = handle_chat_event(&mut state, &event("!1"), now, &mut rng);
        assert!(replies[0].contains("배팅 형식이 잘못되었습니다"));

        let (replies, _) = handle_chat_event(&mut state, &event("!1 abc"), now, &mut rng);
        assert!(replies[0].contains("유효한 포인트 수량"));
    }

    #[test]
    fn test_successful_bet_persists_users() {
        let mut state = state();
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        state.ledger.credit("user1", 500);
        state
            .betting
            .start_round("t", vec!["A".into(), "B".into()], 5, now)
            .unwrap();

        let (replies, dirty) = handle_chat_event(&mut state, &event("!2 300"), now, &mut rng);

        assert!(dirty.users);
        assert!(replies[0].contains("'B'에 300포인트를 배팅"));
        assert_eq!(state.ledger.balance("user1"), 200);
    }

    #[test]
    fn test_purchase_without_account() {
        let mut state = state();
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();

        let (replies, dirty) = handle_chat_event(&mut state, &event("!물약"), now, &mut rng);

        assert!(replies[0].contains("포인트가 없습니다"));
        assert!(!dirty.any());
    }

    #[test]
    fn test_plain_chat_grants_and_respects_mute() {
        let mut state = state();
        state.settings.show_point_messages = false;
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();

        let (replies, dirty) = handle_chat_event(&mut state, &event("hello"), now, &mut rng);

        // Granted silently: balance moved, nothing said in chat
        assert!(replies.is_empty());
        assert!(dirty.users);
        assert!(state.ledger.balance("user1") > 0);
    }

    #[test]
    fn test_operator_settle_flow() {
        let mut state = state();
        let now = Utc::now();
        state.ledger.credit("x", 1000);

        dispatch_operator(
            &mut state,
            OperatorCommand::StartRound {
                topic: "승리?".to_string(),
                options: vec!["A".to_string(), "B".to_string()],
                duration_minutes: 5,
            },
            now,
        )
        .unwrap();

        state
            .betting
            .place_bet("x", 1, BetAmount::Points(100), &mut state.ledger, now)
            .unwrap();

        // Settling an open round is a state conflict
        let err = dispatch_operator(
            &mut state,
            OperatorCommand::SettleRound { winning_option: 1 },
            now,
        )
        .unwrap_err();
        assert!(matches!(err, GameError::StateConflict(_)));

        dispatch_operator(&mut state, OperatorCommand::CloseRound, now).unwrap();
        let (replies, dirty) = dispatch_operator(
            &mut state,
            OperatorCommand::SettleRound { winning_option: 1 },
            now,
        )
        .unwrap();

        assert!(dirty.users && dirty.history);
        assert!(replies.iter().any(|r| r.contains("당첨 선택지: [1] A")));
        assert_eq!(state.ledger.balance("x"), 1000);
    }

    #[test]
    fn test_operator_multiplier_toggle() {
        let mut state = state();
        let now = Utc::now();

        let (replies, dirty) = dispatch_operator(
            &mut state,
            OperatorCommand::SetMultiplier { multiplier: 2.0 },
            now,
        )
        .unwrap();
        assert!(dirty.settings);
        assert!(replies[0].contains("이벤트 시작"));
        assert_eq!(state.settings.point_multiplier, 2.0);

        let (replies, _) = dispatch_operator(
            &mut state,
            OperatorCommand::SetMultiplier { multiplier: 1.0 },
            now,
        )
        .unwrap();
        assert!(replies[0].contains("종료"));
    }
}
