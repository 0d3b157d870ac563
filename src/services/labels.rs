// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Static Mongolian/English strings for user-visible history labels.

use crate::models::{ActivityKind, LocalizedText, ParticipationKind};

struct Phrase {
    mn: &'static str,
    en: &'static str,
}

const JOINED_EVENT: Phrase = Phrase {
    mn: "Арга хэмжээнд бүртгүүлсэн",
    en: "Joined event",
};
const JOINED_OPPORTUNITY: Phrase = Phrase {
    mn: "Сайн дурын ажилд бүртгүүлсэн",
    en: "Joined volunteer opportunity",
};
const REPORTED_EVENT: Phrase = Phrase {
    mn: "Арга хэмжээний тайлан",
    en: "Event report",
};
const REPORTED_OPPORTUNITY: Phrase = Phrase {
    mn: "Сайн дурын ажлын тайлан",
    en: "Volunteer work report",
};

fn phrase(kind: ParticipationKind, activity_kind: ActivityKind) -> &'static Phrase {
    match (kind, activity_kind) {
        (ParticipationKind::Join, ActivityKind::Event) => &JOINED_EVENT,
        (ParticipationKind::Join, ActivityKind::Opportunity) => &JOINED_OPPORTUNITY,
        (ParticipationKind::Report, ActivityKind::Event) => &REPORTED_EVENT,
        (ParticipationKind::Report, ActivityKind::Opportunity) => &REPORTED_OPPORTUNITY,
    }
}

/// Label for a history entry, e.g. `"Joined event: Tree planting"`.
pub fn history_label(
    kind: ParticipationKind,
    activity_kind: ActivityKind,
    title: &str,
) -> LocalizedText {
    let p = phrase(kind, activity_kind);
    LocalizedText {
        mn: format!("{}: {}", p.mn, title),
        en: format!("{}: {}", p.en, title),
    }
}

/// Label for a report entry including the credited hours.
pub fn report_label(activity_kind: ActivityKind, title: &str, hours: f64) -> LocalizedText {
    let base = history_label(ParticipationKind::Report, activity_kind, title);
    LocalizedText {
        mn: format!("{} ({} цаг)", base.mn, hours),
        en: format!("{} ({} h)", base.en, hours),
    }
}
