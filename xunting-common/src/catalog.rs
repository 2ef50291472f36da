//! Built-in lesson catalog
//!
//! Lessons shipped with the application, browsable by category.

use crate::models::{Lesson, LessonCategory, Sentence};

/// All built-in lessons, in library order
pub fn builtin_lessons() -> Vec<Lesson> {
    vec![
        Lesson::new(
            "l1",
            "桃花源记",
            LessonCategory::Middle,
            vec![
                Sentence::new("s1", "晋太元中，武陵人捕鱼为业。", "东晋太元年间，武陵郡有个以捕鱼为生的人。"),
                Sentence::new("s2", "缘溪行，忘路之远近。", "他顺着溪水划船，忘记了路程的远近。"),
                Sentence::new(
                    "s3",
                    "忽逢桃花林，夹岸数百步，中无杂树，芳草鲜美，落英缤纷。",
                    "忽然遇到一片桃花林，生长在溪水的两岸，长达几百步。中间没有别的树，芳草鲜嫩美丽，落花纷纷。",
                ),
                Sentence::new(
                    "s4",
                    "渔人甚异之，复前行，欲穷其林。",
                    "渔人对此感到非常诧异。他又向前划去，想走到那片林子的尽头。",
                ),
                Sentence::new(
                    "s5",
                    "林尽水源，便得一山，山有小口，仿佛若有光。",
                    "桃林的尽头就是溪水的发源地，在那儿便看到一座山。山上有个小洞口，洞里隐隐约约透出光亮。",
                ),
            ],
        )
        .with_author("陶渊明"),
        Lesson::new(
            "l2",
            "爱莲说",
            LessonCategory::Middle,
            vec![
                Sentence::new("s2-1", "水陆草木之花，可爱者甚蕃。", "水上、陆地上各种草木的花，值得喜爱的非常多。"),
                Sentence::new("s2-2", "晋陶渊明独爱菊。", "东晋陶渊明只喜爱菊花。"),
                Sentence::new("s2-3", "自李唐来，世人甚爱牡丹。", "自唐朝以来，世人非常喜爱牡丹。"),
            ],
        )
        .with_author("周敦颐"),
        Lesson::new(
            "e1",
            "The Great Gatsby (Excerpt)",
            LessonCategory::English,
            vec![
                Sentence::new(
                    "e1-1",
                    "In my younger and more vulnerable years my father gave me some advice...",
                    "在我年纪还轻、阅历尚浅的那些年里，父亲给我了一些忠告...",
                ),
                Sentence::new(
                    "e1-2",
                    "\"Whenever you feel like criticizing any one,\" he told me, \"just remember that all the people in this world haven't had the advantages that you've had.\"",
                    "“每逢你想要批评任何人的时候，”他对我说，“你就记住，这个世界上所有的人，并不是个个都有你拥有的那些优越条件的。”",
                ),
            ],
        )
        .with_author("F. Scott Fitzgerald"),
    ]
}

/// The lesson selected on first launch
pub fn default_lesson() -> Lesson {
    builtin_lessons().remove(0)
}

pub fn lessons_in_category(category: LessonCategory) -> Vec<Lesson> {
    builtin_lessons()
        .into_iter()
        .filter(|l| l.category == category)
        .collect()
}

pub fn find_lesson(id: &str) -> Option<Lesson> {
    builtin_lessons().into_iter().find(|l| l.id == id)
}
