//! Simplified/traditional Chinese character conversion.
//!
//! Static table of common traditional/simplified pairs; characters not
//! in the table pass through unchanged, so conversion never fails.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Common (traditional, simplified) character pairs.
const PAIRS: &[(char, char)] = &[
    ('國', '国'), ('學', '学'), ('書', '书'), ('電', '电'), ('話', '话'),
    ('語', '语'), ('說', '说'), ('讀', '读'), ('寫', '写'), ('聽', '听'),
    ('見', '见'), ('視', '视'), ('觀', '观'), ('開', '开'), ('關', '关'),
    ('門', '门'), ('間', '间'), ('問', '问'), ('時', '时'), ('當', '当'),
    ('會', '会'), ('應', '应'), ('對', '对'), ('為', '为'), ('無', '无'),
    ('從', '从'), ('來', '来'), ('後', '后'), ('發', '发'), ('動', '动'),
    ('機', '机'), ('車', '车'), ('號', '号'), ('業', '业'), ('產', '产'),
    ('長', '长'), ('風', '风'), ('雲', '云'), ('飛', '飞'), ('馬', '马'),
    ('鳥', '鸟'), ('魚', '鱼'), ('龍', '龙'), ('頭', '头'), ('臉', '脸'),
    ('體', '体'), ('點', '点'), ('線', '线'), ('麵', '面'), ('飯', '饭'),
    ('麼', '么'), ('樣', '样'), ('檔', '档'), ('傳', '传'), ('輸', '输'),
    ('網', '网'), ('絡', '络'), ('連', '连'), ('結', '结'), ('圖', '图'),
    ('畫', '画'), ('顯', '显'), ('設', '设'), ('備', '备'), ('錄', '录'),
    ('製', '制'), ('處', '处'), ('員', '员'), ('據', '据'),
    ('庫', '库'), ('儲', '储'), ('載', '载'), ('訊', '讯'),
    ('訂', '订'), ('購', '购'), ('買', '买'), ('賣', '卖'), ('錢', '钱'),
    ('銀', '银'), ('鐵', '铁'), ('鋼', '钢'), ('銅', '铜'), ('金', '金'),
    ('樂', '乐'), ('藥', '药'), ('醫', '医'), ('護', '护'), ('養', '养'),
    ('熱', '热'), ('溫', '温'), ('涼', '凉'), ('凍', '冻'),
    ('歡', '欢'), ('謝', '谢'), ('請', '请'), ('讓', '让'),
    ('幫', '帮'), ('們', '们'), ('這', '这'), ('裡', '里'),
    ('邊', '边'), ('過', '过'), ('還', '还'), ('進', '进'), ('遠', '远'),
    ('運', '运'), ('選', '选'), ('遊', '游'), ('戲', '戏'), ('劇', '剧'),
    ('場', '场'), ('廳', '厅'), ('廣', '广'), ('莊', '庄'), ('嚴', '严'),
    ('舊', '旧'), ('萬', '万'), ('億', '亿'), ('幾', '几'), ('個', '个'),
    ('隻', '只'), ('雙', '双'), ('條', '条'), ('張', '张'),
    ('頁', '页'), ('題', '题'), ('類', '类'), ('數', '数'), ('計', '计'),
    ('認', '认'), ('識', '识'), ('記', '记'), ('憶', '忆'), ('懷', '怀'),
    ('愛', '爱'), ('戀', '恋'), ('願', '愿'), ('夢', '梦'), ('想', '想'),
    ('聲', '声'), ('響', '响'), ('韻', '韵'), ('詞', '词'),
    ('詩', '诗'), ('慶', '庆'), ('節', '节'),
    ('歲', '岁'), ('歷', '历'), ('紀', '纪'), ('統', '统'),
    ('總', '总'), ('領', '领'), ('導', '导'), ('師', '师'), ('團', '团'),
    ('隊', '队'), ('軍', '军'), ('戰', '战'), ('勝', '胜'), ('敗', '败'),
    ('舉', '举'), ('辦', '办'), ('務', '务'), ('實', '实'), ('現', '现'),
    ('價', '价'), ('質', '质'), ('標', '标'),
    ('準', '准'), ('確', '确'), ('錯', '错'), ('誤', '误'), ('測', '测'),
    ('試', '试'), ('驗', '验'), ('證', '证'), ('簡', '简'), ('繁', '繁'),
    ('轉', '转'), ('換', '换'), ('單', '单'), ('複', '复'), ('雜', '杂'),
    ('純', '纯'), ('絕', '绝'), ('緊', '紧'), ('鬆', '松'), ('壓', '压'),
    ('報', '报'), ('紙', '纸'), ('筆', '笔'), ('硯', '砚'),
    ('妳', '你'), ('係', '系'), ('與', '与'), ('於', '于'), ('並', '并'),
    ('臺', '台'), ('灣', '湾'), ('島', '岛'), ('陸', '陆'),
    ('區', '区'), ('縣', '县'), ('鄉', '乡'), ('鎮', '镇'), ('街', '街'),
];

static TRAD_TO_SIMP: Lazy<HashMap<char, char>> =
    Lazy::new(|| PAIRS.iter().copied().collect());

static SIMP_TO_TRAD: Lazy<HashMap<char, char>> =
    Lazy::new(|| PAIRS.iter().map(|&(t, s)| (s, t)).collect());

/// Convert traditional characters to simplified, passing unknowns through.
pub fn to_simplified(text: &str) -> String {
    text.chars()
        .map(|c| *TRAD_TO_SIMP.get(&c).unwrap_or(&c))
        .collect()
}

/// Convert simplified characters to traditional, passing unknowns through.
pub fn to_traditional(text: &str) -> String {
    text.chars()
        .map(|c| *SIMP_TO_TRAD.get(&c).unwrap_or(&c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_common_pairs() {
        assert_eq!(to_simplified("電話"), "电话");
        assert_eq!(to_traditional("电话"), "電話");
    }

    #[test]
    fn passes_unknown_chars_through() {
        assert_eq!(to_simplified("hello 世界"), "hello 世界");
        assert_eq!(to_traditional("hello 123"), "hello 123");
    }

    #[test]
    fn table_is_bidirectional() {
        for &(trad, simp) in PAIRS {
            if trad != simp {
                assert_eq!(to_simplified(&trad.to_string()), simp.to_string());
            }
        }
    }

    #[test]
    fn feminine_you_maps_to_plain_you() {
        assert_eq!(to_simplified("妳好"), "你好");
        assert_eq!(to_traditional("你好"), "妳好");
    }
}
