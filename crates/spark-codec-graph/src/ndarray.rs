//! 稠密多维数组与行优先下标遍历器。
//!
//! [`NdArray`] 以一维 `Vec` 按行优先顺序（最后一个下标变化最快）存放元素，
//! 与数组链的线格式顺序一致；[`IndexWalker`] 依同样顺序枚举全部下标元组。

use std::ops::{Index, IndexMut};

use crate::error::{CodecError, Result};

/// 秩 ≥ 1 的稠密多维数组。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NdArray<T> {
    dims: Vec<usize>,
    data: Vec<T>,
}

fn element_count(dims: &[usize]) -> Result<usize> {
    if dims.is_empty() {
        return Err(CodecError::InvalidLength {
            what: "array rank",
            value: 0,
        });
    }
    dims.iter()
        .try_fold(1_usize, |acc, dim| acc.checked_mul(*dim))
        .ok_or(CodecError::InvalidLength {
            what: "array element count",
            value: i64::MAX,
        })
}

impl<T> NdArray<T> {
    /// 由形状与行优先元素构建；元素数量必须等于各维之积。
    pub fn from_vec(dims: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected = element_count(&dims)?;
        if expected != data.len() {
            return Err(CodecError::InvalidLength {
                what: "array element count",
                value: data.len() as i64,
            });
        }
        Ok(Self { dims, data })
    }

    /// 以下标函数逐个生成元素。
    pub fn from_fn(dims: Vec<usize>, mut init: impl FnMut(&[usize]) -> T) -> Result<Self> {
        let total = element_count(&dims)?;
        let mut data = Vec::with_capacity(total);
        for index in IndexWalker::new(&dims) {
            data.push(init(&index));
        }
        Ok(Self { dims, data })
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 行优先的扁平元素视图。
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.dims.len() {
            return None;
        }
        let mut offset = 0_usize;
        for (&i, &dim) in index.iter().zip(&self.dims) {
            if i >= dim {
                return None;
            }
            offset = offset * dim + i;
        }
        Some(offset)
    }

    pub fn get(&self, index: &[usize]) -> Option<&T> {
        self.offset(index).map(|offset| &self.data[offset])
    }

    pub fn get_mut(&mut self, index: &[usize]) -> Option<&mut T> {
        self.offset(index).map(|offset| &mut self.data[offset])
    }

    /// 行优先枚举全部下标。
    pub fn indices(&self) -> IndexWalker {
        IndexWalker::new(&self.dims)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T> Index<&[usize]> for NdArray<T> {
    type Output = T;

    fn index(&self, index: &[usize]) -> &T {
        match self.offset(index) {
            Some(offset) => &self.data[offset],
            None => panic!("index {index:?} out of bounds for shape {:?}", self.dims),
        }
    }
}

impl<T> IndexMut<&[usize]> for NdArray<T> {
    fn index_mut(&mut self, index: &[usize]) -> &mut T {
        match self.offset(index) {
            Some(offset) => &mut self.data[offset],
            None => panic!("index {index:?} out of bounds for shape {:?}", self.dims),
        }
    }
}

/// 行优先（最后一个下标变化最快）的下标遍历器。
///
/// 任一维为 0 时不产生任何下标。
#[derive(Clone, Debug)]
pub struct IndexWalker {
    dims: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl IndexWalker {
    pub fn new(dims: &[usize]) -> Self {
        let empty = dims.is_empty() || dims.contains(&0);
        Self {
            dims: dims.to_vec(),
            next: (!empty).then(|| vec![0; dims.len()]),
        }
    }
}

impl Iterator for IndexWalker {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let mut successor = current.clone();
        for axis in (0..self.dims.len()).rev() {
            successor[axis] += 1;
            if successor[axis] < self.dims[axis] {
                self.next = Some(successor);
                return Some(current);
            }
            successor[axis] = 0;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walker_is_row_major() {
        let order: Vec<Vec<usize>> = IndexWalker::new(&[2, 3]).collect();
        assert_eq!(
            order,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2]
            ]
        );
        assert_eq!(IndexWalker::new(&[3, 0, 2]).count(), 0);
    }

    #[test]
    fn from_fn_matches_flat_layout() {
        let array = NdArray::from_fn(vec![2, 2, 2], |index| index[0] * 4 + index[1] * 2 + index[2])
            .unwrap();
        assert_eq!(array.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(array[&[1, 0, 1][..]], 5);
        assert_eq!(array.get(&[2, 0, 0]), None);
        assert_eq!(array.get(&[0, 0]), None);
    }

    #[test]
    fn from_vec_validates_shape() {
        assert!(NdArray::from_vec(vec![2, 2], vec![1, 3, 4, 1]).is_ok());
        assert!(matches!(
            NdArray::from_vec(vec![2, 2], vec![1, 3, 4]).unwrap_err(),
            CodecError::InvalidLength { what: "array element count", value: 3 }
        ));
        assert!(NdArray::<u8>::from_vec(Vec::new(), Vec::new()).is_err());
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut array = NdArray::from_vec(vec![2, 2], vec![1, 3, 4, 1]).unwrap();
        *array.get_mut(&[1, 1]).unwrap() = 9;
        array[&[0, 0][..]] = 8;
        assert_eq!(array.into_vec(), vec![8, 3, 4, 9]);
    }
}
